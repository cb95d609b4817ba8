//! Foundation layer: identities, messages, answers, events and profiles.

pub mod event;
pub mod id;
pub mod message;
pub mod profile;

pub use event::{
    MalformedEvent, MessageEvent, MessageKind, MessageReference, RtmEvent,
    SUBTYPE_MESSAGE_CHANGED, SUBTYPE_MESSAGE_DELETED,
};
pub use id::{MessageId, SelfIdentity, is_direct_channel};
pub use message::{Answer, AnswerOption, AnswerOptions, IncomingMessage, OutboundMessage};
pub use profile::UserProfile;
