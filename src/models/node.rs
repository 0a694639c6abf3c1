use serde::{Deserialize, Serialize};

/// Who authored a node's content. Fixed at creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Default role: the pre-seeded root is an empty assistant node, and
    /// an absent storage key decodes to an empty assistant leaf.
    #[default]
    Assistant,
}

impl Role {
    /// The role of the next conversational turn.
    pub fn opposite(self) -> Self {
        match self {
            Role::User => Role::Assistant,
            Role::Assistant => Role::User,
        }
    }
}

/// Generation metadata attached once a task has settled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMeta {
    /// Model identifier that produced the content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Terminal error description when generation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One persisted conversation node.
///
/// Every field defaults, so a record read back from a key that was never
/// written decodes as an empty assistant leaf rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub role: Role,
    /// Absent while the node is an empty placeholder or streaming with no
    /// text yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Child node ids, newest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    /// Currently displayed child; if present, always a member of `children`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    /// Cached subtree size: `sum(1 + weight(c))` over direct children.
    #[serde(default)]
    pub weight: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<NodeMeta>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_opposite_alternates() {
        assert_eq!(Role::User.opposite(), Role::Assistant);
        assert_eq!(Role::Assistant.opposite(), Role::User);
    }

    #[test]
    fn test_empty_object_decodes_to_default_record() {
        let record: NodeRecord = serde_json::from_str("{}").unwrap();
        assert_eq!(record, NodeRecord::default());
        assert_eq!(record.role, Role::Assistant);
        assert!(record.content.is_none());
        assert!(record.children.is_empty());
        assert_eq!(record.weight, 0);
    }

    #[test]
    fn test_record_roundtrip_preserves_shape() {
        let record = NodeRecord {
            role: Role::User,
            content: Some("hi".to_string()),
            children: vec!["a".to_string(), "b".to_string()],
            select: Some("a".to_string()),
            weight: 3,
            meta: Some(NodeMeta {
                model: Some("gpt-4o-mini".to_string()),
                error: None,
            }),
        };

        let json = serde_json::to_string(&record).unwrap();
        let back: NodeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::User).unwrap();
        assert_eq!(json, "\"user\"");
    }
}
