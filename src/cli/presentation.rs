//! CLI presentation: JSON views of typed values. Keys are hex strings so the
//! output is plain JSON objects.

use crate::component::{ComponentKind, ComponentSummary};
use crate::room::RoomState;
use crate::summary::RoomSummary;
use crate::validate::Validation;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct StateView {
    pub configuration: Option<ConfigurationView>,
    pub members: Vec<MemberView>,
    pub bans: Vec<BanView>,
    pub messages: Vec<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct ConfigurationView {
    pub version: u64,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct MemberView {
    pub id: String,
    pub invited_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    pub banned: bool,
}

#[derive(Debug, Serialize)]
pub struct BanView {
    pub member: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub time: u64,
    pub author: String,
    pub seq: u32,
    pub content: String,
}

impl StateView {
    pub fn new(state: &RoomState) -> Self {
        Self {
            configuration: state.configuration.as_ref().map(|c| ConfigurationView {
                version: c.configuration.version,
                name: c.configuration.name.clone(),
                description: c.configuration.description.clone(),
            }),
            members: state
                .members
                .values()
                .map(|m| MemberView {
                    id: m.id().to_hex(),
                    invited_by: m.invited_by().to_hex(),
                    nickname: state.nickname(&m.id()).map(str::to_string),
                    banned: state.is_banned(&m.id()),
                })
                .collect(),
            bans: state
                .bans
                .values()
                .map(|b| BanView {
                    member: b.banned().to_hex(),
                    reason: b.ban.reason.clone(),
                })
                .collect(),
            messages: state
                .messages
                .values()
                .map(|m| MessageView {
                    time: m.id().time,
                    author: m.author().to_hex(),
                    seq: m.id().seq,
                    content: m.message.content.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummaryView {
    pub components: Vec<ComponentSummaryView>,
}

#[derive(Debug, Serialize)]
pub struct ComponentSummaryView {
    pub component: &'static str,
    pub entries: usize,
    pub digest: Option<String>,
}

impl SummaryView {
    pub fn new(summary: &RoomSummary) -> Self {
        let components = summary
            .components
            .iter()
            .map(|(kind, component)| {
                let (entries, digest) = match component {
                    ComponentSummary::Configuration(_) => (1, None),
                    ComponentSummary::Members(s) => (s.tags.len(), Some(hex::encode(s.digest))),
                    ComponentSummary::Bans(s) | ComponentSummary::MemberInfo(s) => {
                        (s.tags.len(), Some(hex::encode(s.digest)))
                    }
                    ComponentSummary::Messages(s) => (s.tags.len(), Some(hex::encode(s.digest))),
                };
                ComponentSummaryView {
                    component: ComponentKind::name(*kind),
                    entries,
                    digest,
                }
            })
            .collect();
        Self { components }
    }
}

pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

pub fn validation_json(verdict: &Validation) -> Value {
    match verdict {
        Validation::Valid => json!({ "verdict": "valid" }),
        Validation::Invalid(reason) => json!({
            "verdict": "invalid",
            "reason": reason.to_string(),
        }),
        Validation::NeedsRelated(ids) => json!({
            "verdict": "needs_related",
            "instances": ids.iter().map(|id| id.to_hex()).collect::<Vec<_>>(),
        }),
    }
}
