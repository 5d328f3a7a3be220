//! Output image derivation for build PipelineRuns.

use snapgate_state::PipelineRun;

use crate::error::{ReconcileError, ReconcileResult};

/// Build result holding the pushed image reference
pub const IMAGE_URL_RESULT: &str = "IMAGE_URL";

/// Build result holding the pushed image digest
pub const IMAGE_DIGEST_RESULT: &str = "IMAGE_DIGEST";

/// Repository part of an image reference: tag and digest removed.
///
/// A `:` only starts a tag when it follows the last `/`, so registry ports
/// (`host:5000/img`) are preserved.
pub fn image_repository(image: &str) -> &str {
    let image = image.split('@').next().unwrap_or(image);
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].find(':') {
        Some(i) => &image[..name_start + i],
        None => image,
    }
}

/// Digest-pinned pull spec of the image a build PipelineRun produced.
pub fn output_image_pull_spec(run: &PipelineRun) -> ReconcileResult<String> {
    let invalid = |reason: String| ReconcileError::InvalidBuildOutput {
        pipeline_run: run.metadata.name.clone(),
        reason,
    };

    let url = run
        .task_result(IMAGE_URL_RESULT)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(format!("missing {IMAGE_URL_RESULT} result")))?;
    let digest = run
        .task_result(IMAGE_DIGEST_RESULT)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(format!("missing {IMAGE_DIGEST_RESULT} result")))?;

    Ok(format!("{}@{}", image_repository(url), digest))
}
