#[derive(Debug, thiserror::Error)]
pub enum BinderError {
	#[error("no [startPage]/[endPage] markers found in chapter text")]
	NoPagesFound,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderConfigError {
	#[error("invalid boilerplate strip pattern: {0}")]
	StripPattern(#[from] regex::Error),
}
