//! # SCORM Engine
//!
//! A SCORM 1.2 / SCORM 2004 runtime for e-learning content, plus the manifest
//! and package model used to ship it.
//!
//! The runtime locates the LMS API object, exchanges the SCORM data model with
//! it, and validates every access against per-version element tables before
//! the LMS sees it. When no LMS can be found, the same calls are served from a
//! local cache so content keeps working.
//!
//! ## Design Principles
//!
//! - **No clock reads**: time is passed in as a [`Timestamp`]; periodic
//!   commits are driven by [`ScormEngine::tick`]
//! - **Data-driven versions**: everything that differs between 1.2 and 2004
//!   is a table in [`version`] or [`schema`]
//! - **Errors as values**: runtime calls return `Result<_, ErrorCode>` and
//!   still record the last error the way SCORM content expects
//!
//! ## Core Concepts
//!
//! ### Host discovery
//!
//! [`locate_api`] walks a [`Window`] graph (parents first, then the opener)
//! looking for `API` or `API_1484_11`, bounded by [`MAX_DISCOVERY_HOPS`].
//!
//! ### Runtime
//!
//! - [`ApiAdapter`] - one LMS session: state machine, validation, host calls
//! - [`ScormEngine`] - the content-facing API with cache fallback
//! - [`ProgressTracker`] - location, progress, score and status in
//!   version-independent terms
//!
//! ### Quizzes
//!
//! [`QuizEngine`] runs attempts, scores them and stores history in suspend
//! data as a versioned [`SuspendState`].
//!
//! ### Packages
//!
//! [`Manifest`] parses and writes `imsmanifest.xml`; [`validate_manifest`]
//! cross-checks it against an [`Archive`].
//!
//! ## Quick Start
//!
//! ```rust
//! use scorm_engine::{
//!     host_ref, DirectHost, EngineConfig, MemoryCache, MockLms, ProgressTracker,
//!     ScormEngine, ScormVersion, Status,
//! };
//!
//! // 1. Find an LMS (here an in-memory one)
//! let (lms, host) = host_ref(MockLms::seeded(ScormVersion::Scorm2004));
//!
//! // 2. Start a session
//! let config = EngineConfig::new(ScormVersion::Scorm2004);
//! let mut engine = ScormEngine::new(config, DirectHost(host), MemoryCache::new());
//! assert!(engine.initialize(1_706_745_600_000));
//! assert!(engine.is_connected());
//!
//! // 3. Track progress
//! let mut tracker = ProgressTracker::new(engine, 1_706_745_600_000);
//! tracker.set_location("lesson-2").unwrap();
//! tracker.set_status(Status::Incomplete).unwrap();
//!
//! assert_eq!(lms.borrow().value("cmi.location"), Some("lesson-2"));
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module provides C-compatible functions for authoring tools and
//! native shells. All structured data is exchanged as JSON strings.

pub mod adapter;
pub mod cache;
pub mod code;
pub mod discovery;
pub mod error;
pub mod ffi;
pub mod generator;
pub mod host;
pub mod manifest;
pub mod package;
pub mod quiz;
pub mod runtime;
pub mod schema;
pub mod suspend;
pub mod tracker;
pub mod version;

// Re-export main types at crate root
pub use adapter::{ApiAdapter, CallResult, SessionState};
pub use cache::{CacheStore, FileCache, MemoryCache};
pub use code::ErrorCode;
pub use discovery::{
    locate_api, ApiLocator, DirectHost, Discovery, Frame, FrameTree, Standalone, Window,
    WindowLocator, MAX_DISCOVERY_HOPS,
};
pub use error::{Error, Result};
pub use generator::{generate_question, generate_quiz, QuestionTemplate, QuizTemplate};
pub use host::{host_ref, HostFault, HostRef, HostValue, LmsApi, MockLms};
pub use manifest::{parse_manifest, Item, Manifest, ManifestMetadata, Organization, Resource};
pub use package::{
    validate_manifest, validate_package, Archive, MemoryArchive, Package, PackageBuilder,
    ValidationReport, MANIFEST_FILE,
};
pub use quiz::{
    Answer, Feedback, Question, QuestionType, QuizAttempt, QuizConfig, QuizEngine, ScoreOutcome,
};
pub use runtime::{AutoCommit, ConnectionMode, EngineConfig, ScormEngine};
pub use schema::{
    count_indices, normalize_path, Access, DataModelSchema, ElementDef, ValueType,
};
pub use suspend::{SuspendState, SUSPEND_FORMAT_VERSION};
pub use tracker::{ProgressTracker, Status, TrackingSnapshot};
pub use version::{ApiMethod, Field, ScormVersion};

/// Type aliases for clarity
pub type Timestamp = u64;
pub type QuizId = String;
pub type QuestionId = String;
pub type ResourceId = String;
