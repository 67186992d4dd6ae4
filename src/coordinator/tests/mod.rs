use super::test_helpers::*;
use super::*;
use crate::error::{Error, ValidationError};
use crate::types::{BatchPhase, ItemErrorKind, ItemStatus, SourceFile};
use std::time::Duration;
use tokio::sync::Semaphore;
