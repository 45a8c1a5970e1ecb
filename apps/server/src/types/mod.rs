// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Type definitions for jobs and API requests and responses.

mod job;
mod request;
mod response;

pub use job::{unix_seconds, Job, JobFailure, JobStatus};
pub use request::GenerateRequest;
pub use response::{GenerateResponse, StatusResponse, UploadResponse};
