//! Projection of one tree path into provider-ready history.

use pcommon::MessageId;
use pprovider::LinearMessage;

use crate::{ConversationTree, TreeError};

/// Ordered provider history plus the system prompt extracted from it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinearConversation {
    pub system_prompt: Option<String>,
    pub messages: Vec<LinearMessage>,
}

impl LinearConversation {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages worth sending: nodes whose only content was lifted into the
    /// system prompt are dropped.
    pub fn provider_messages(&self) -> Vec<LinearMessage> {
        self.messages
            .iter()
            .filter(|message| !message.content.is_empty() || !message.attachments.is_empty())
            .cloned()
            .collect()
    }
}

/// Builds root-to-`leaf_id` history: one [`LinearMessage`] per path node.
///
/// `explicit_system_prompt` comes first; `System` blocks found on the path
/// are appended after it in path order.
pub fn build_linear_history(
    tree: &ConversationTree,
    leaf_id: &MessageId,
    explicit_system_prompt: Option<&str>,
) -> Result<LinearConversation, TreeError> {
    let path = tree.path_to(leaf_id)?;

    let mut system_parts = explicit_system_prompt
        .filter(|prompt| !prompt.trim().is_empty())
        .map(|prompt| vec![prompt.to_string()])
        .unwrap_or_default();

    let mut messages = Vec::with_capacity(path.len());
    for node in path {
        system_parts.extend(
            node.system_content()
                .filter(|content| !content.trim().is_empty())
                .map(str::to_string),
        );
        messages.push(
            LinearMessage::new(node.role.provider_role(), node.rendered_content())
                .with_attachments(node.attachments.clone()),
        );
    }

    Ok(LinearConversation {
        system_prompt: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages,
    })
}

#[cfg(test)]
mod tests {
    use pprovider::{Attachment, Role};

    use super::*;
    use crate::{ContentBlock, MessagePayload, TreeErrorKind};

    #[test]
    fn scenario_root_and_reply_linearize_in_order() {
        let mut tree = ConversationTree::new("conv-1");
        let root = tree
            .add_message(None, MessagePayload::user("hi"))
            .expect("root");
        let reply = tree
            .add_message(Some(&root), MessagePayload::ai("hello"))
            .expect("reply");

        let linear = build_linear_history(&tree, &reply, None).expect("history");
        assert_eq!(
            linear.messages,
            vec![LinearMessage::user("hi"), LinearMessage::assistant("hello")]
        );
        assert_eq!(linear.system_prompt, None);

        let edited_root = tree
            .edit_message(&root, MessagePayload::user("hey"))
            .expect("edit");
        let second_reply = tree
            .add_message(Some(&edited_root), MessagePayload::ai("hello again"))
            .expect("second reply");
        assert_ne!(second_reply, reply);
        assert!(tree.contains(&reply));

        let branch = build_linear_history(&tree, &second_reply, None).expect("history");
        assert_eq!(branch.messages[0].content, "hey");
    }

    #[test]
    fn length_matches_depth_for_every_leaf() {
        let mut tree = ConversationTree::new("conv-1");
        let mut parent = tree
            .add_message(None, MessagePayload::user("0"))
            .expect("root");
        for index in 1..6 {
            let payload = if index % 2 == 1 {
                MessagePayload::ai(index.to_string())
            } else {
                MessagePayload::user(index.to_string())
            };
            parent = tree.add_message(Some(&parent), payload).expect("child");
        }
        let root = tree.root_ids()[0].clone();
        let side = tree
            .add_message(Some(&root), MessagePayload::ai("side"))
            .expect("side branch");

        for leaf in tree.leaves() {
            let linear = build_linear_history(&tree, &leaf.id, None).expect("history");
            assert_eq!(linear.len(), tree.depth(&leaf.id).expect("depth"));
            assert_eq!(
                linear.messages.last().map(|m| m.content.as_str()),
                Some(leaf.rendered_content().as_str())
            );
        }
        assert_eq!(build_linear_history(&tree, &side, None).expect("side").len(), 2);
    }

    #[test]
    fn system_blocks_are_lifted_after_explicit_prompt() {
        let mut tree = ConversationTree::new("conv-1");
        let root = tree
            .add_message(
                None,
                MessagePayload::user("question").with_block(ContentBlock::system("cite sources")),
            )
            .expect("root");
        let notice = tree
            .add_message(
                Some(&root),
                MessagePayload::new(
                    crate::MessageRole::System,
                    vec![ContentBlock::system("answer in french")],
                ),
            )
            .expect("notice");

        let linear =
            build_linear_history(&tree, &notice, Some("You are helpful.")).expect("history");
        assert_eq!(
            linear.system_prompt.as_deref(),
            Some("You are helpful.\n\ncite sources\n\nanswer in french")
        );
        assert_eq!(linear.len(), 2);
        assert_eq!(linear.messages[1].role, Role::System);
        assert_eq!(linear.provider_messages().len(), 1);
    }

    #[test]
    fn attachments_travel_with_their_message() {
        let attachment = Attachment {
            id: "a1".to_string(),
            name: "notes.txt".to_string(),
            mime_type: "text/plain".to_string(),
            content: "aGk=".to_string(),
            text_content: Some("hi".to_string()),
            size: 2,
        };
        let mut tree = ConversationTree::new("conv-1");
        let root = tree
            .add_message(
                None,
                MessagePayload::user("see file").with_attachments(vec![attachment.clone()]),
            )
            .expect("root");

        let linear = build_linear_history(&tree, &root, None).expect("history");
        assert_eq!(linear.messages[0].attachments, vec![attachment]);
    }

    #[test]
    fn missing_leaf_is_not_found() {
        let tree = ConversationTree::new("conv-1");
        let error = build_linear_history(&tree, &MessageId::new("ghost"), None)
            .expect_err("missing leaf");
        assert_eq!(error.kind, TreeErrorKind::NotFound);
    }
}
