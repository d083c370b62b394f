use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Command, Stdio};

#[test]
fn mcp_stdio_smoke() {
    let bin = env!("CARGO_BIN_EXE_code-capture-mcp");
    let workspace = tempfile::TempDir::new().unwrap();
    std::fs::write(
        workspace.path().join("shapes.py"),
        "class Square:\n    def area(self):\n        return self.side ** 2\n",
    )
    .unwrap();

    let mut child = Command::new(bin)
        .current_dir(workspace.path())
        .env("CODE_CAPTURE_ROOT", workspace.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn code-capture-mcp");

    {
        let stdin = child.stdin.as_mut().expect("child stdin");
        let messages = [
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": {
                    "name": "capture_symbol",
                    "arguments": {"file_path": "shapes.py", "class_name": "Square", "method_name": "area"}
                }
            }),
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "tools/call",
                "params": {"name": "summarize_file", "arguments": {"file_path": "missing.py"}}
            }),
        ];
        for message in messages {
            // One JSON-RPC message per line.
            writeln!(stdin, "{}", message).unwrap();
        }
        writeln!(stdin, "not json").unwrap();
    }

    // Close stdin so the server loop can exit.
    drop(child.stdin.take());

    let stdout = child.stdout.take().expect("child stdout");
    let mut by_id: HashMap<String, Value> = HashMap::new();
    let mut responses = 0;
    for line in BufReader::new(stdout).lines() {
        let line = line.unwrap();
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).expect("response is JSON");
        responses += 1;
        by_id.insert(value["id"].to_string(), value);
    }
    let status = child.wait().unwrap();
    assert!(status.success());

    // The notification gets no response; the garbage line gets a parse error.
    assert_eq!(responses, 5);
    assert_eq!(by_id["null"]["error"]["code"], -32700);

    assert_eq!(by_id["1"]["result"]["serverInfo"]["name"], "code-capture-mcp");
    assert_eq!(by_id["2"]["result"]["tools"].as_array().unwrap().len(), 7);

    let captured = by_id["3"]["result"]["content"][0]["text"].as_str().unwrap();
    assert!(captured.contains("Lines 2-3"));
    assert!(captured.contains("```python\n2 |     def area(self):\n3 |         return self.side ** 2\n```"));

    assert_eq!(by_id["4"]["result"]["isError"], true);
}
