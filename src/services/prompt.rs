//! Prompt construction for role-specific contract review.

use super::completion::ChatMessage;

const SYSTEM_PROMPT: &str = "你是一名专业的合同审查律师，请从用户指定的角度对合同进行审查，指出潜在风险并提供修改建议。返回结果必须是有效的JSON格式。";

/// Build the system + user conversation for reviewing `contract_text` as `role`.
///
/// The contract text is embedded verbatim.
pub fn build_review_messages(role: &str, contract_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(review_prompt(role, contract_text)),
    ]
}

fn review_prompt(role: &str, contract_text: &str) -> String {
    format!(
        r#"你是一名专业的合同审查律师。请从{role}的角度审查以下合同，指出潜在风险并提供修改建议。
合同内容如下：
{contract_text}

请按照以下JSON格式返回分析结果：
{{
    "contract_type": "合同类型",
    "risks": ["风险点1", "风险点2", ...],
    "recommendations": ["建议1", "建议2", ...],
    "role_perspective": "作为{role}需要特别关注的条款说明"
}}"#
    )
}
