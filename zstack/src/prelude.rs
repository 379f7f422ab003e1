//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use zstack::prelude::*;
//! ```

pub use crate::{FileCodec, GrayImage, ImageCodec, SampleType};

pub use crate::{
    FilterPolicy, NormalizationConfig, NormalizationMask, OutputManifest, ProgressCallback,
    StackNormalizer, normalize_stack,
};

pub use crate::{Direction, detect_sharp_changes};

pub use common::CancelToken;
