use chat_api::{ChatFinishReason, ChatStreamEvent, SseStreamParser};

#[test]
fn sse_parser_maps_content_finish_and_usage() {
    let payload = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":2,\"total_tokens\":14}}\n\n",
        "data: [DONE]\n\n"
    );

    let events = SseStreamParser::parse_frames(payload);
    assert_eq!(
        events,
        vec![
            ChatStreamEvent::ContentDelta {
                delta: "hel".to_string()
            },
            ChatStreamEvent::ContentDelta {
                delta: "lo".to_string()
            },
            ChatStreamEvent::Finished {
                reason: Some(ChatFinishReason::Stop)
            },
            ChatStreamEvent::Usage {
                prompt_tokens: 12,
                completion_tokens: 2
            },
        ]
    );
}

#[test]
fn sse_parser_emits_tool_call_fragments_by_index() {
    let payload = concat!(
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"type\":\"function\",\"function\":{\"name\":\"read_file\",\"arguments\":\"\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{\\\"path\\\":\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"a.rb\\\"}\"}}]}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n"
    );

    let events = SseStreamParser::parse_frames(payload);
    assert_eq!(events.len(), 4);
    assert_eq!(
        events[0],
        ChatStreamEvent::ToolCallDelta {
            index: 0,
            id: Some("call_a".to_string()),
            name: Some("read_file".to_string()),
            arguments: String::new(),
        }
    );
    let arguments: String = events
        .iter()
        .filter_map(|event| match event {
            ChatStreamEvent::ToolCallDelta { arguments, .. } => Some(arguments.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(arguments, "{\"path\":\"a.rb\"}");
    assert_eq!(
        events[3],
        ChatStreamEvent::Finished {
            reason: Some(ChatFinishReason::ToolCalls)
        }
    );
}

#[test]
fn sse_parser_ignores_comments_and_malformed_frames() {
    let payload = concat!(
        ": keep-alive\n\n",
        "data: {broken-json\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\n"
    );

    let events = SseStreamParser::parse_frames(payload);
    assert_eq!(
        events,
        vec![ChatStreamEvent::ContentDelta {
            delta: "x".to_string()
        }]
    );
}

#[test]
fn sse_parser_surfaces_error_payloads() {
    let events = SseStreamParser::parse_frames(
        "data: {\"error\":{\"message\":\"context length exceeded\",\"type\":\"invalid_request_error\"}}\n\n",
    );

    assert_eq!(
        events,
        vec![ChatStreamEvent::Error {
            code: Some("invalid_request_error".to_string()),
            message: Some("context length exceeded".to_string()),
        }]
    );
}
