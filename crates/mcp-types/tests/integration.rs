use mcp_types::{CallToolResult, ServerInfo, Tool, ToolInputSchema};
use serde_json::json;

#[test]
fn tool_serializes_with_camel_case_input_schema() {
    let schema = ToolInputSchema {
        schema_type: "object".to_string(),
        properties: Some(json!({
            "arg": { "type": "string" }
        })),
        required: None,
        additional_properties: None,
    };

    let tool = Tool::new("test-tool", "A test tool").with_schema(schema);

    let json = serde_json::to_value(&tool).unwrap();
    assert_eq!(json["name"], "test-tool");
    assert_eq!(json["description"], "A test tool");
    assert!(json["inputSchema"].is_object());
}

#[test]
fn call_tool_result_text_builder_is_not_an_error() {
    let result = CallToolResult::text("Hello world");
    assert_eq!(result.is_error, None);
    assert_eq!(result.content[0].as_text(), Some("Hello world"));
}

#[test]
fn server_info_round_trips_through_json() {
    let info = ServerInfo::new("my-server", "1.0.0");
    let json = serde_json::to_value(&info).unwrap();
    let parsed: ServerInfo = serde_json::from_value(json).unwrap();
    assert_eq!(parsed.name, "my-server");
    assert_eq!(parsed.version, "1.0.0");
}
