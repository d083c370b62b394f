use super::CodeBlock;

/// Render a block as a `File:`/`Lines` header followed by a fenced code block,
/// optionally numbering each line.
pub fn format_code_block(block: &CodeBlock, with_line_numbers: bool) -> String {
    let body = block.code.trim_end_matches('\n');

    let code = if with_line_numbers {
        let width = block.end_line.to_string().len();
        body.split('\n')
            .zip(block.start_line..)
            .map(|(line, number)| format!("{:>width$} | {}", number, line, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        body.to_string()
    };

    format!(
        "File: {}\nLines {}-{}\n\n```{}\n{}\n```",
        block.file_path.display(),
        block.start_line,
        block.end_line,
        block.language,
        code
    )
}

/// Markdown document with one numbered section per block.
pub fn code_documentation(blocks: &[CodeBlock], title: &str) -> String {
    let mut doc = format!("# {}\n\n", title);
    for (i, block) in blocks.iter().enumerate() {
        doc.push_str(&format!("## Block {}\n", i + 1));
        doc.push_str(&format_code_block(block, true));
        doc.push_str("\n\n");
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn block() -> CodeBlock {
        CodeBlock {
            file_path: PathBuf::from("src/app.py"),
            start_line: 8,
            end_line: 10,
            code: "def run():\n    x = 1\n    return x\n".to_string(),
            language: "python".to_string(),
        }
    }

    #[test]
    fn test_format_with_line_numbers() {
        let expected = "File: src/app.py\nLines 8-10\n\n```python\n 8 | def run():\n 9 |     x = 1\n10 |     return x\n```";
        assert_eq!(format_code_block(&block(), true), expected);
    }

    #[test]
    fn test_format_without_line_numbers() {
        let expected =
            "File: src/app.py\nLines 8-10\n\n```python\ndef run():\n    x = 1\n    return x\n```";
        assert_eq!(format_code_block(&block(), false), expected);
    }

    #[test]
    fn test_unknown_language_has_bare_fence() {
        let mut block = block();
        block.language = String::new();
        assert!(format_code_block(&block, false).contains("\n```\ndef run():"));
    }

    #[test]
    fn test_code_documentation() {
        let doc = code_documentation(&[block(), block()], "Walkthrough");
        assert!(doc.starts_with("# Walkthrough\n\n## Block 1\nFile: src/app.py"));
        assert!(doc.contains("```\n\n## Block 2\n"));
        assert!(doc.ends_with("```\n\n"));
    }
}
