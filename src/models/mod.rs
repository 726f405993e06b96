pub mod album;
pub mod duplicate;
pub mod extension_token;
pub mod list;
pub mod release;
pub mod track_pick;
pub mod user;

pub use album::{Album, AlbumPayload};
pub use duplicate::{DuplicateAlbum, DuplicateGroup, MergeRequest, MergeResult, ScanProgress};
pub use extension_token::{CreateTokenRequest, ExtensionToken, IssuedToken, TokenInfo};
pub use list::{
    CreateListRequest, ExportedAlbum, List, ListDetail, ListEntry, ListExport, ListSummary,
    RenameListRequest, ReorderRequest,
};
pub use release::WeeklyRelease;
pub use track_pick::{SetPickRequest, TrackPick};
pub use user::{AuthResponse, CreateUserRequest, LoginRequest, User, UserInfo, UserRole};
