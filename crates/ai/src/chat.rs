//! Chat assistant: keyword intent analysis and system-prompt assembly.
//!
//! The assistant answers questions over the ledger's own records. Intent
//! analysis decides which read models the caller should pull into the
//! context blob; the blob then rides in the system prompt of the completion
//! call. All heuristics operate on the raw message text.

use crate::textgen::ChatMessage;

/// Which data the user's question needs, plus an extracted person name if
/// the question mentions one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatIntent {
    pub needs_gifts: bool,
    pub needs_contacts: bool,
    pub needs_inventory: bool,
    pub needs_outgoing: bool,
    pub person_name: Option<String>,
}

impl ChatIntent {
    pub fn needs_anything(&self) -> bool {
        self.needs_gifts
            || self.needs_contacts
            || self.needs_inventory
            || self.needs_outgoing
            || self.person_name.is_some()
    }
}

/// Canned reply used when the collaborator call fails.
pub const FALLBACK_REPLY: &str = "抱歉，我遇到了一些问题。请稍后再试。";

const COMMON_SURNAMES: &str = "李王张刘陈杨赵黄周吴徐孙胡朱高林何郭马罗梁宋郑谢韩唐冯于董萧程曹袁邓许傅沈曾彭吕苏卢蒋蔡贾丁魏薛叶阎余潘杜戴夏钟汪田任姜范方石姚谭廖邹熊金陆郝孔白崔康毛邱秦江史顾侯邵孟龙万段漕钱汤尹黎易常武乔贺赖龚文";

const TRAILING_VERBS: &str = "送收给的是有要问";

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c)
}

/// "x …后面跟着… y" check: does `b` occur somewhere after `a`?
fn contains_seq(message: &str, a: &str, b: &str) -> bool {
    match message.find(a) {
        Some(pos) => message[pos + a.len()..].contains(b),
        None => false,
    }
}

fn contains_any(message: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| message.contains(k))
}

/// Extract a likely person name: a common surname followed by one or two CJK
/// characters, with a trailing verb stripped ("李明送" → "李明").
fn extract_person_name(message: &str) -> Option<String> {
    let chars: Vec<char> = message.chars().collect();
    for (idx, &c) in chars.iter().enumerate() {
        if !COMMON_SURNAMES.contains(c) {
            continue;
        }

        let mut name = String::new();
        name.push(c);
        for &follow in chars.iter().skip(idx + 1).take(2) {
            if is_cjk(follow) {
                name.push(follow);
            } else {
                break;
            }
        }

        if name.chars().count() < 2 {
            continue;
        }

        while let Some(last) = name.chars().last() {
            if name.chars().count() > 1 && TRAILING_VERBS.contains(last) {
                name.pop();
            } else {
                break;
            }
        }

        if name.chars().count() >= 2 {
            return Some(name);
        }
    }
    None
}

/// Keyword intent analysis over the user message.
pub fn analyze_intent(message: &str) -> ChatIntent {
    let needs_gifts = contains_any(message, &["收到", "收礼", "谁送", "送我"])
        || contains_seq(message, "礼物", "收")
        || contains_seq(message, "送了", "我")
        || contains_seq(message, "送给", "我")
        || contains_seq(message, "送", "什么");

    let needs_contacts = contains_any(message, &["联系人", "公司", "电话", "年龄", "性别"]);

    let needs_inventory = contains_any(message, &["库存", "还有", "剩余", "多少"]);

    let needs_outgoing = contains_any(message, &["我送", "送出", "送过"])
        || (message.contains("送给") && !contains_seq(message, "送给", "我"));

    ChatIntent {
        needs_gifts,
        needs_contacts,
        needs_inventory,
        needs_outgoing,
        person_name: extract_person_name(message),
    }
}

/// System prompt for the assistant, with the queried records inlined.
pub fn build_system_prompt(context_data: &str) -> String {
    let data = if context_data.trim().is_empty() {
        "（暂无相关数据）"
    } else {
        context_data
    };

    format!(
        r#"你是一个礼物管理系统的智能助手。你可以帮助用户：
1. 查询礼物记录（收到的、送出的）
2. 查询联系人信息
3. 查询库存情况
4. 提供送礼建议
5. 回答礼物相关的问题

你有以下系统数据可以使用：
{data}

请根据上面的数据回答用户的问题。注意：
- 如果数据中有答案，请提取关键信息并用友好的方式回答
- 包含具体的礼物名称、数量、价值、日期等信息
- 如果数据不足，请说明并建议用户去相应页面查看
- 使用友好、专业的中文"#
    )
}

/// Assemble the full message list for a chat completion.
pub fn build_chat_messages(
    context_data: &str,
    history: &[ChatMessage],
    user_message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(build_system_prompt(context_data)));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(user_message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asking_about_received_gifts() {
        let intent = analyze_intent("我最近收到了哪些礼物？");
        assert!(intent.needs_gifts);
        assert!(!intent.needs_outgoing);
    }

    #[test]
    fn asking_about_inventory() {
        let intent = analyze_intent("库存里还有多少茶叶？");
        assert!(intent.needs_inventory);
    }

    #[test]
    fn asking_about_sent_gifts() {
        let intent = analyze_intent("我送出过什么？");
        assert!(intent.needs_outgoing);
    }

    #[test]
    fn sent_to_me_is_not_outgoing() {
        let intent = analyze_intent("张伟送给我什么了");
        assert!(intent.needs_gifts);
        assert!(!intent.needs_outgoing);
    }

    #[test]
    fn extracts_person_name_and_strips_verb() {
        let intent = analyze_intent("李明送了我什么");
        assert_eq!(intent.person_name.as_deref(), Some("李明"));
    }

    #[test]
    fn no_name_in_plain_question() {
        let intent = analyze_intent("most recent stock?");
        assert_eq!(intent.person_name, None);
    }

    #[test]
    fn plain_chitchat_needs_nothing() {
        let intent = analyze_intent("你好呀");
        assert!(!intent.needs_anything());
    }

    #[test]
    fn system_prompt_embeds_context() {
        let prompt = build_system_prompt("库存信息：大红袍 x3");
        assert!(prompt.contains("大红袍 x3"));

        let empty = build_system_prompt("  ");
        assert!(empty.contains("（暂无相关数据）"));
    }

    #[test]
    fn chat_messages_are_ordered_system_history_user() {
        let history = vec![
            ChatMessage::user("之前的问题"),
            ChatMessage::assistant("之前的回答"),
        ];
        let messages = build_chat_messages("ctx", &history, "新问题");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, crate::textgen::ChatRole::System);
        assert_eq!(messages[3].content, "新问题");
    }
}
