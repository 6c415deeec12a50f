use thiserror::Error;

/// A top-level envelope failure (spec §7: "ParseError (envelope unparsable
/// as both JSON and XML) — top-level error").
#[derive(Debug, Error)]
pub enum EnvelopeError
{
	#[error("transaction envelope is not valid JSON or XML")]
	Unparsable,
}
