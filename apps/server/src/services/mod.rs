// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Service modules for job tracking, storage and generation.

pub mod cleanup;
pub mod generator;
pub mod jobs;
pub mod storage;

pub use generator::Generator;
pub use jobs::JobStore;
pub use storage::ArtifactStore;
