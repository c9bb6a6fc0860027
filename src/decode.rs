//! Decoders for structured answer bodies.
//!
//! These work on the [`AvpCursor`] of an [`Answer`](crate::client::Answer) or
//! a [`Notification`](crate::notification::Notification) and turn the
//! server's nested containers into typed values.

use std::fmt;
use std::time::Duration;

use crate::avp::AvpCursor;
use crate::codes::{avp, node, notify};
use crate::error::internal::{DecodeErrorKind, ProtocolErrorKind};
use crate::error::{Error, Result};
use crate::value::Value;

/// One entry of a notification list.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    /// `NOTIFY_TYPE` value, see [`codes::notify`](crate::codes::notify).
    pub kind: u32,
    /// Attributes following the type.
    pub body: AvpCursor,
}

/// Interpreted notification.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigChange {
    ParameterChanged { path: String, value: Value },
    InstanceCreated { path: String },
    InstanceDeleted { path: String },
    /// A type this crate does not interpret.
    Other { kind: u32 },
}

impl NotificationEvent {
    /// Interpret the body according to the notification type.
    pub fn change(&self) -> Result<ConfigChange> {
        let mut body = self.body.clone();
        Ok(match self.kind {
            notify::PARAMETER_CHANGED => {
                let path = body.expect(avp::PATH)?.as_string()?;
                let value = Value::decode(&body.take_avp()?)?;
                ConfigChange::ParameterChanged { path, value }
            }
            notify::INSTANCE_CREATED => ConfigChange::InstanceCreated {
                path: body.expect(avp::PATH)?.as_string()?,
            },
            notify::INSTANCE_DELETED => ConfigChange::InstanceDeleted {
                path: body.expect(avp::PATH)?.as_string()?,
            },
            kind => ConfigChange::Other { kind },
        })
    }
}

/// Read the next notification from `group`.
///
/// `Ok(None)` means the list is exhausted (the server's "nothing" marker).
pub fn decode_notification(group: &mut AvpCursor) -> Result<Option<NotificationEvent>> {
    let Some(container) = group.next_avp()? else {
        return Ok(None);
    };
    if container.code != avp::CONTAINER {
        tracing::debug!(target: "async_dmconfig::decode", { dm.code = container.code }, "notification is not a container");
        return Err(Error::decode(
            container.offset,
            DecodeErrorKind::UnexpectedCode {
                expected: avp::CONTAINER,
                actual: container.code,
            },
        ));
    }
    let mut body = container.as_nonempty_group()?;
    let kind = body.expect(avp::NOTIFY_TYPE)?.as_u32()?;
    Ok(Some(NotificationEvent { kind, body }))
}

/// Iterate over every notification in `group`.
///
/// # Example
///
/// ```rust,no_run
/// use async_dmconfig::decode::{ConfigChange, decode_notifications};
///
/// # async fn example(conn: &mut async_dmconfig::Connection) -> async_dmconfig::Result<()> {
/// let pending = conn.get_passive_notifications().await?;
/// for event in decode_notifications(pending) {
///     if let ConfigChange::ParameterChanged { path, value } = event?.change()? {
///         println!("{} = {}", path, value);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub fn decode_notifications(group: AvpCursor) -> Notifications {
    Notifications {
        group,
        failed: false,
    }
}

/// Iterator returned by [`decode_notifications`]; stops after the first error.
#[derive(Debug, Clone)]
pub struct Notifications {
    group: AvpCursor,
    failed: bool,
}

impl Iterator for Notifications {
    type Item = Result<NotificationEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match decode_notification(&mut self.group) {
            Ok(event) => event.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Kind of a configuration tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Parameter,
    Table,
    Object,
    Instance,
    Other(u32),
}

impl From<u32> for NodeKind {
    fn from(value: u32) -> Self {
        match value {
            node::PARAMETER => Self::Parameter,
            node::TABLE => Self::Table,
            node::OBJECT => Self::Object,
            node::INSTANCE => Self::Instance,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parameter => f.write_str("parameter"),
            Self::Table => f.write_str("table"),
            Self::Object => f.write_str("object"),
            Self::Instance => f.write_str("instance"),
            Self::Other(v) => write!(f, "node type {}", v),
        }
    }
}

/// A node from a `DB_LIST` answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Value type code of a parameter.
    pub datatype: Option<u32>,
    /// Current value, when the server sent one in place of a bare type.
    pub value: Option<Value>,
    /// Child count of an object.
    pub size: Option<u32>,
    /// Nested nodes of recursive listings.
    pub children: Vec<Node>,
}

/// Deepest node nesting accepted from a `DB_LIST` answer.
pub const MAX_NODE_DEPTH: usize = 64;

fn decode_node(container: &crate::avp::Avp, depth: usize) -> Result<Node> {
    if depth >= MAX_NODE_DEPTH {
        tracing::debug!(target: "async_dmconfig::decode", { dm.offset = container.offset, dm.max = MAX_NODE_DEPTH }, "node list nested too deep");
        return Err(Error::decode(
            container.offset,
            DecodeErrorKind::NestingTooDeep {
                max: MAX_NODE_DEPTH,
            },
        ));
    }
    let mut body = container.as_nonempty_group()?;
    let name_attr = body.expect(avp::NODE_NAME)?;
    if name_attr.is_empty() {
        return Err(Error::decode(
            name_attr.offset,
            DecodeErrorKind::EmptyContainer {
                code: avp::NODE_NAME,
            },
        ));
    }
    let mut node = Node {
        name: name_attr.as_string()?,
        kind: NodeKind::from(body.expect(avp::NODE_TYPE)?.as_u32()?),
        datatype: None,
        value: None,
        size: None,
        children: Vec::new(),
    };

    match node.kind {
        NodeKind::Parameter => {
            let attr = body.take_avp()?;
            if attr.code == avp::NODE_DATATYPE {
                node.datatype = Some(attr.as_u32()?);
            } else {
                node.datatype = Some(attr.code);
                node.value = Some(Value::decode(&attr)?);
            }
        }
        NodeKind::Object => {
            node.size = Some(body.expect(avp::NODE_SIZE)?.as_u32()?);
        }
        _ => {}
    }

    while let Some(child) = body.next_avp()? {
        if child.code != avp::CONTAINER {
            tracing::debug!(target: "async_dmconfig::decode", { dm.node = %node.name, dm.code = child.code }, "unexpected attribute in node");
            return Err(Error::protocol(ProtocolErrorKind::UnexpectedAttribute {
                code: child.code,
            }));
        }
        node.children.push(decode_node(&child, depth + 1)?);
    }
    Ok(node)
}

/// Decode a `DB_LIST` answer into its nodes.
pub fn decode_node_list(mut group: AvpCursor) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    while let Some(container) = group.next_avp()? {
        if container.code != avp::CONTAINER {
            return Err(Error::decode(
                container.offset,
                DecodeErrorKind::UnexpectedCode {
                    expected: avp::CONTAINER,
                    actual: container.code,
                },
            ));
        }
        nodes.push(decode_node(&container, 0)?);
    }
    Ok(nodes)
}

/// Answer to a gateway access-class request.
#[derive(Debug, Clone)]
pub struct AccessClassReply {
    pub auth_req_state: i32,
    pub auth_result: i32,
    pub reply_code: u32,
    /// Reply messages, if the server sent any.
    pub messages: Option<AvpCursor>,
}

impl AccessClassReply {
    pub fn decode(mut group: AvpCursor) -> Result<Self> {
        let auth_req_state = group.expect(avp::ENUMID)?.as_i32()?;
        let auth_result = group.expect(avp::ENUMID)?.as_i32()?;
        let reply_code = group.expect(avp::UINT32)?.as_u32()?;
        let messages = match group.next_avp()? {
            None => None,
            Some(attr) if attr.code == avp::CONTAINER => Some(attr.as_nonempty_group()?),
            Some(attr) => {
                return Err(Error::protocol(ProtocolErrorKind::UnexpectedAttribute {
                    code: attr.code,
                }));
            }
        };
        Ok(Self {
            auth_req_state,
            auth_result,
            reply_code,
            messages,
        })
    }

    /// Reply messages as strings.
    pub fn message_strings(&self) -> Result<Vec<String>> {
        let Some(mut messages) = self.messages.clone() else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        while let Some(attr) = messages.next_avp()? {
            out.push(Value::decode(&attr)?.to_string());
        }
        Ok(out)
    }
}

/// Answer to `CFG_SESSION_INFO`: the configuration session currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfgSessionInfo {
    pub session_id: u32,
    pub flags: u32,
    pub timeout: Duration,
}

impl CfgSessionInfo {
    pub fn decode(mut group: AvpCursor) -> Result<Self> {
        Ok(Self {
            session_id: group.expect(avp::SESSIONID)?.as_u32()?,
            flags: group.expect(avp::UINT32)?.as_u32()?,
            timeout: group.expect(avp::TIMEOUT_SESSION)?.as_timeval()?,
        })
    }
}
