use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value as Json;

/// Response status codes (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status
{
	Success,
	Failure,
	ValidationFailure,
	TransactionFailed,
}

impl Status
{
	pub fn code(self) -> i32
	{
		match self {
			Self::Success => 0,
			Self::Failure => -1,
			Self::ValidationFailure => -4,
			Self::TransactionFailed => -10,
		}
	}
}

impl Serialize for Status
{
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i32(self.code())
	}
}

/// Extra fields carried by a DS response (spec §3).
#[derive(Debug, Clone, Serialize)]
pub struct DsResponseExtra
{
	#[serde(rename = "isDSResponse")]
	pub is_ds_response: bool,
	pub start_row: u64,
	pub end_row: u64,
	pub total_rows: u64,
	pub affected_rows: u64,
	pub invalidate_cache: bool,
	#[serde(skip_serializing_if = "BTreeMap::is_empty")]
	pub errors: BTreeMap<String, String>,
}

impl Default for DsResponseExtra
{
	fn default() -> Self
	{
		Self {
			is_ds_response: true,
			start_row: 0,
			end_row: 0,
			total_rows: 0,
			affected_rows: 0,
			invalidate_cache: false,
			errors: BTreeMap::new(),
		}
	}
}

/// Extra fields carried by an RPC response (spec §3).
#[derive(Debug, Clone, Default, Serialize)]
pub struct RpcResponseExtra
{
	#[serde(skip_serializing_if = "Option::is_none")]
	pub stacktrace: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResponseKind
{
	DataSource(DsResponseExtra),
	Rpc(RpcResponseExtra),
}

/// A single response slot, order-aligned with its request operation (spec
/// invariant 1).
#[derive(Debug, Clone, Serialize)]
pub struct Response
{
	pub status: Status,
	pub data: Json,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub queue_status: Option<i32>,
	#[serde(flatten)]
	pub kind: ResponseKind,
}

impl Response
{
	pub fn ds_success(data: Json, extra: DsResponseExtra) -> Self
	{
		Self { status: Status::Success, data, queue_status: None, kind: ResponseKind::DataSource(extra) }
	}

	pub fn ds_failure(status: Status, data: Json, extra: DsResponseExtra) -> Self
	{
		Self { status, data, queue_status: None, kind: ResponseKind::DataSource(extra) }
	}

	pub fn rpc_success(data: Json) -> Self
	{
		Self { status: Status::Success, data, queue_status: None, kind: ResponseKind::Rpc(RpcResponseExtra::default()) }
	}

	pub fn rpc_failure(status: Status, data: Json, stacktrace: Option<String>) -> Self
	{
		Self { status, data, queue_status: None, kind: ResponseKind::Rpc(RpcResponseExtra { stacktrace }) }
	}

	pub fn is_ds_response(&self) -> bool
	{
		matches!(self.kind, ResponseKind::DataSource(_))
	}
}
