//! RPC operation lifecycle (spec §4.5.2) and the class registry that
//! replaces dynamic `className` loading (Design Notes §9).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use dsbroker_wire::{RpcOperationSpec, Response, Status};

use super::error::OperationResult;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The capability an RPC `className` resolves to (spec §4.5.2). Hand-written
/// in terms of boxed futures, like [`crate::database::ResourceFactory`], so
/// the registry can hold `Box<dyn RpcObject>`.
///
/// Every hook is optional, matching the spec's "if the instance exposes
/// `init`/`startTransaction`/`freeResources`, call it" phrasing — types that
/// don't need a hook simply don't override it.
pub trait RpcObject: Send + Sync
{
	fn init(&mut self) -> BoxFuture<'_, OperationResult<()>>
	{
		Box::pin(async { Ok(()) })
	}

	fn start_transaction(&mut self) -> BoxFuture<'_, OperationResult<()>>
	{
		Box::pin(async { Ok(()) })
	}

	/// Calls `method_name` if given and exposed, else falls back to a
	/// default `execute` method (spec §4.5.2).
	fn call(&mut self, method_name: Option<&str>) -> BoxFuture<'_, OperationResult<serde_json::Value>>;

	fn commit(&mut self) -> BoxFuture<'_, OperationResult<()>>
	{
		Box::pin(async { Ok(()) })
	}

	fn rollback(&mut self) -> BoxFuture<'_, OperationResult<()>>
	{
		Box::pin(async { Ok(()) })
	}

	fn free_resources(&mut self) -> BoxFuture<'_, ()>
	{
		Box::pin(async {})
	}
}

/// Maps a `className` string to a constructor (Design Notes §9: "replace
/// with a registry of named factories … no reflection / no dynamic file
/// loading on the request path"), populated at process start from
/// `config.rpc.objects`.
#[derive(Default)]
pub struct RpcObjectRegistry
{
	constructors: HashMap<String, fn(serde_json::Value) -> Box<dyn RpcObject>>,
}

impl RpcObjectRegistry
{
	pub fn new() -> Self
	{
		Self::default()
	}

	pub fn register(&mut self, class_name: impl Into<String>, ctor: fn(serde_json::Value) -> Box<dyn RpcObject>)
	{
		self.constructors.insert(class_name.into(), ctor);
	}

	pub fn construct(&self, class_name: &str, data: serde_json::Value) -> Option<Box<dyn RpcObject>>
	{
		self.constructors.get(class_name).map(|ctor| ctor(data))
	}
}

/// Runs one RPC operation through init/execute/free (spec §4.5.2).
pub struct RpcOperationRunner
{
	spec: RpcOperationSpec,
	instance: Option<Box<dyn RpcObject>>,
}

impl RpcOperationRunner
{
	pub fn new(spec: RpcOperationSpec) -> Self
	{
		Self { spec, instance: None }
	}

	/// "if the envelope carries `className`, load a class … instantiate with
	/// the request as constructor argument; if the instance exposes `init`,
	/// call it." An unregistered class name is not an error here — it leaves
	/// `instance` unset, and `execute` echoes the request per spec.
	pub async fn init(&mut self, registry: &RpcObjectRegistry) -> OperationResult<()>
	{
		let Some(class_name) = self.spec.class_name.clone() else { return Ok(()) };
		let Some(mut instance) = registry.construct(&class_name, self.spec.data.clone()) else {
			tracing::debug!(class_name, "no RPC object registered for this class; request will be echoed");
			return Ok(());
		};
		instance.init().await?;
		self.instance = Some(instance);
		Ok(())
	}

	pub async fn execute(&mut self) -> Response
	{
		let Some(instance) = self.instance.as_mut() else {
			return Response::rpc_success(self.spec.data.clone());
		};

		if let Err(error) = instance.start_transaction().await {
			return Response::rpc_failure(Status::Failure, serde_json::Value::String(error.to_string()), None);
		}

		match instance.call(self.spec.method_name.as_deref()).await {
			Ok(result) => match instance.commit().await {
				Ok(()) => Response::rpc_success(result),
				Err(_) => {
					if let Err(error) = instance.rollback().await {
						tracing::warn!(%error, "rollback after commit failure also failed");
					}
					Response::rpc_failure(Status::TransactionFailed, serde_json::Value::Null, None)
				},
			},
			Err(error) => {
				if let Err(rollback_error) = instance.rollback().await {
					tracing::warn!(%rollback_error, "rollback after execute failure also failed");
				}
				Response::rpc_failure(Status::Failure, serde_json::Value::String(error.to_string()), None)
			},
		}
	}

	pub async fn free(&mut self)
	{
		if let Some(instance) = self.instance.as_mut() {
			instance.free_resources().await;
		}
	}
}
