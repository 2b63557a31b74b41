//! Versioned route path constants for the administrative surface.
//!
//! Mirrors the reference media server's `v1_path!` macro convention: every
//! path is built from one prefix so a version bump is a one-line change.

macro_rules! v1_path {
    ($path:literal) => {
        concat!("/api/v1", $path)
    };
}

pub mod v1 {
    pub const ROOT: &str = "/api/v1";

    pub mod uploads {
        pub const ARCHIVE: &str = v1_path!("/uploads/archive");
    }

    pub mod imports {
        pub const COLLECTION: &str = v1_path!("/imports");
        pub const ITEM: &str = v1_path!("/imports/{id}");
        pub const EXECUTE: &str = v1_path!("/imports/{id}/execute");
        pub const LEGACY_IMPORT: &str = v1_path!("/imports/legacy");

        pub mod users {
            pub const COLLECTION: &str = v1_path!("/imports/{id}/users");
            pub const MAPPING: &str = v1_path!("/imports/{id}/users/{foreign_user_id}/mapping");
        }

        pub mod books {
            pub const COLLECTION: &str = v1_path!("/imports/{id}/books");
            pub const MAPPING: &str = v1_path!("/imports/{id}/books/{foreign_media_id}/mapping");
        }

        pub mod sessions {
            pub const COLLECTION: &str = v1_path!("/imports/{id}/sessions");
            pub const SKIP: &str = v1_path!("/imports/{id}/sessions/{foreign_session_id}/skip");
        }
    }

    pub mod analysis {
        pub const START: &str = v1_path!("/analysis");
        pub const ONE_SHOT: &str = v1_path!("/analysis/one-shot");
        pub const ITEM: &str = v1_path!("/analysis/{analysis_id}");
    }
}
