use serde_json::{Map, Value};

use crate::ToolCallRequest;

#[derive(Debug, Default, Clone)]
struct PendingCall {
    index: usize,
    call_id: Option<String>,
    tool_name: String,
    arguments: String,
}

/// Collects streamed tool-call fragments into complete requests.
///
/// Calls are returned in the order their first fragment arrived. Calls that
/// arrive without an id get `call_<n>`, numbered across every `finish` of the
/// same assembler.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAssembler {
    pending: Vec<PendingCall>,
    generated_ids: usize,
}

impl ToolCallAssembler {
    /// Continues id generation after `generated_ids` previously issued ids.
    #[must_use]
    pub fn continuing_from(generated_ids: usize) -> Self {
        Self {
            pending: Vec::new(),
            generated_ids,
        }
    }

    /// How many ids this assembler has generated, including the seed.
    #[must_use]
    pub fn generated_ids(&self) -> usize {
        self.generated_ids
    }

    pub fn push_fragment(
        &mut self,
        index: usize,
        call_id: Option<String>,
        tool_name: Option<String>,
        arguments_fragment: &str,
    ) {
        let position = match self.pending.iter().position(|call| call.index == index) {
            Some(position) => position,
            None => {
                self.pending.push(PendingCall {
                    index,
                    ..PendingCall::default()
                });
                self.pending.len() - 1
            }
        };

        let call = &mut self.pending[position];
        if let Some(call_id) = call_id.filter(|value| !value.trim().is_empty()) {
            call.call_id = Some(call_id);
        }
        if let Some(tool_name) = tool_name.filter(|value| !value.trim().is_empty()) {
            call.tool_name.push_str(&tool_name);
        }
        call.arguments.push_str(arguments_fragment);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drains collected fragments into complete tool-call requests.
    pub fn finish(&mut self) -> Vec<ToolCallRequest> {
        let pending = std::mem::take(&mut self.pending);
        let generated_ids = &mut self.generated_ids;
        pending
            .into_iter()
            .map(|call| ToolCallRequest {
                call_id: call.call_id.unwrap_or_else(|| {
                    *generated_ids += 1;
                    format!("call_{generated_ids}")
                }),
                tool_name: call.tool_name.trim().to_string(),
                arguments: decode_arguments(&call.arguments),
            })
            .collect()
    }
}

fn decode_arguments(raw: &str) -> Map<String, Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Map::new();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("_raw".to_string(), Value::String(raw.to_string()));
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merges_fragments_by_index_in_first_seen_order() {
        let mut assembler = ToolCallAssembler::default();
        assembler.push_fragment(1, Some("b".into()), Some("list_files".into()), "{}");
        assembler.push_fragment(0, Some("a".into()), Some("read_file".into()), "{\"pa");
        assembler.push_fragment(0, None, None, "th\":\"src/lib.rs\"}");

        let calls = assembler.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call_id, "b");
        assert_eq!(calls[0].tool_name, "list_files");
        assert_eq!(calls[1].tool_name, "read_file");
        assert_eq!(calls[1].arguments.get("path"), Some(&json!("src/lib.rs")));
        assert!(assembler.is_empty());
    }

    #[test]
    fn missing_call_id_is_generated_and_empty_arguments_decode_to_object() {
        let mut assembler = ToolCallAssembler::default();
        assembler.push_fragment(0, None, Some("list_files".into()), "");

        let calls = assembler.finish();
        assert_eq!(calls[0].call_id, "call_1");
        assert!(calls[0].arguments.is_empty());
    }

    #[test]
    fn generated_ids_keep_counting_across_responses() {
        let mut assembler = ToolCallAssembler::default();
        assembler.push_fragment(0, None, Some("list_files".into()), "{}");
        assembler.push_fragment(1, Some("given".into()), Some("read_file".into()), "{}");
        let first = assembler.finish();
        assert_eq!(first[0].call_id, "call_1");
        assert_eq!(first[1].call_id, "given");

        assembler.push_fragment(0, None, Some("list_files".into()), "{}");
        assert_eq!(assembler.finish()[0].call_id, "call_2");

        let mut next = ToolCallAssembler::continuing_from(assembler.generated_ids());
        next.push_fragment(0, None, Some("read_file".into()), "{}");
        assert_eq!(next.finish()[0].call_id, "call_3");
        assert_eq!(next.generated_ids(), 3);
    }

    #[test]
    fn malformed_arguments_are_preserved_for_the_dispatch_boundary() {
        let mut assembler = ToolCallAssembler::default();
        assembler.push_fragment(0, Some("x".into()), Some("read_file".into()), "{\"path\":");

        let calls = assembler.finish();
        assert_eq!(calls[0].arguments.get("_raw"), Some(&json!("{\"path\":")));
    }
}
