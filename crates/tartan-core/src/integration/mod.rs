//! Integration layer: capability contracts with the remote service.

pub mod capability;

pub use capability::{
    BoxedChatDriver, BoxedEmojiReactor, BoxedFileUploader, BoxedLogger, BoxedRealTimeSender,
    BoxedUserInfoFinder, Capabilities, ChatDriver, EmojiReactor, FileUploadParams, FileUploader,
    RealTimeSender, SLogger, UploadOption, UploadedFile, UserInfoFinder,
};
