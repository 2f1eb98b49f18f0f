mod error;
mod model;
mod tape_client;

pub mod prelude {
    pub use crate::error::{TapeError, TapeOperation};
    pub use crate::model::{
        ArchiveInfo, ArchiveInfoRequest, FileState, FileStatus, StageRequest, StageResponse,
        StageStatus, StagedFile,
    };
    pub use crate::tape_client::{TapeClientConfig, TapeClientInstrumented as TapeClient};
}
