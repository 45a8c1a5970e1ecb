// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Request types for the API.

use scenelift_vision::GenerationOptions;
use serde::Deserialize;

/// Body of `POST /api/v1/generate`.
///
/// Option fields are optional and fall back to [`GenerationOptions::default`].
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRequest {
    /// Job returned by the upload endpoint.
    #[serde(default)]
    pub job_id: Option<String>,

    #[serde(flatten)]
    pub options: GenerationOptions,
}
