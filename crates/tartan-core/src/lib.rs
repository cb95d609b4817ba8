//! # Tartan Core
//!
//! Core types and capability contracts for the tartan chat-bot engine.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! Plain data shared by every other crate:
//! - **Identities**: [`MessageId`], [`SelfIdentity`]
//! - **Messages**: [`IncomingMessage`] in, [`Answer`] out, [`OutboundMessage`] to the driver
//! - **Events**: the real-time stream ([`RtmEvent`], [`MessageEvent`])
//! - **Profiles**: [`UserProfile`]
//!
//! ### Integration Layer
//!
//! Contracts with the outside world, all `Send + Sync` trait objects:
//! [`ChatDriver`], [`EmojiReactor`], [`FileUploader`], [`RealTimeSender`],
//! [`UserInfoFinder`] and [`SLogger`].
//!
//! ## Data Flow
//!
//! ```text
//! ┌───────────┐  RtmEvent   ┌────────┐ IncomingMessage ┌─────────┐
//! │ Transport │────────────▶│ Engine │────────────────▶│ Plugins │
//! └───────────┘             └────────┘◀────────────────└─────────┘
//!       ▲                        │            Answer
//!       └──── ChatDriver ────────┘
//! ```

pub mod error;
pub mod foundation;
pub mod integration;

pub use error::{
    ApiError, ApiResult, StorageError, StorageResult, UserInfoError, UserInfoResult,
};

pub use foundation::{
    Answer, AnswerOption, AnswerOptions, IncomingMessage, MalformedEvent, MessageEvent, MessageId,
    MessageKind, MessageReference, OutboundMessage, RtmEvent, SUBTYPE_MESSAGE_CHANGED,
    SUBTYPE_MESSAGE_DELETED, SelfIdentity, UserProfile, is_direct_channel,
};

pub use integration::{
    BoxedChatDriver, BoxedEmojiReactor, BoxedFileUploader, BoxedLogger, BoxedRealTimeSender,
    BoxedUserInfoFinder, Capabilities, ChatDriver, EmojiReactor, FileUploadParams, FileUploader,
    RealTimeSender, SLogger, UploadOption, UploadedFile, UserInfoFinder,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::*;
    pub use super::foundation::*;
    pub use super::integration::*;
}
