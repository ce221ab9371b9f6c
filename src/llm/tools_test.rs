use super::*;

#[test]
fn agent_tools_cover_the_toolbox() {
    let tools = agent_tools();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "read_file",
            "list_dir",
            "write_file",
            "replace_string_in_file",
            "insert_edit_into_file",
            "grep_search",
            "file_search",
            "run_in_terminal",
            "get_terminal_output",
            "edit_notebook_file",
            "get_notebook_summary",
            "fetch_webpage",
            "get_project_setup_info",
        ]
    );
}

#[test]
fn schema_shape_is_object() {
    for tool in &agent_tools() {
        assert_eq!(
            tool.input_schema.get("type").and_then(|v| v.as_str()),
            Some("object"),
            "tool {} schema should be type=object",
            tool.name
        );
    }
}

#[test]
fn required_fields_are_declared_properties() {
    for tool in &agent_tools() {
        let props = tool.input_schema["properties"].as_object().unwrap();
        if let Some(required) = tool.input_schema.get("required").and_then(|r| r.as_array()) {
            for field in required {
                let field = field.as_str().unwrap();
                assert!(props.contains_key(field), "{}: {field} missing from properties", tool.name);
            }
        }
    }
}
