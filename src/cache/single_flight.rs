use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::future::{BoxFuture, FutureExt, Shared};

/// 计算任务没有正常结束（panic 或运行时关闭）
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("in-flight computation aborted: {0}")]
pub struct FlightAborted(pub String);

type Flight<T> = Shared<BoxFuture<'static, Result<T, FlightAborted>>>;

/// 按键合并并发请求：同一个键同时只有一个计算在执行，其余调用者等待同一个结果。
///
/// 计算在独立的 tokio 任务中运行，调用者被取消不会让它停在半路；
/// 任务结束时从表中移除自己，之后的调用会重新发起。
pub struct SingleFlight<T> {
    in_flight: Arc<Mutex<HashMap<String, Flight<T>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前正在执行的键数量
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Flight<T>>> {
        self.in_flight.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// 执行或加入 `key` 上的计算。`make` 只有在没有进行中的计算时才会被调用。
    pub async fn work<F, Fut>(&self, key: &str, make: F) -> Result<T, FlightAborted>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut in_flight = self.lock();
            match in_flight.get(key) {
                Some(flight) => {
                    tracing::debug!(key, "Joining in-flight fetch");
                    flight.clone()
                }
                None => {
                    let table = Arc::clone(&self.in_flight);
                    let owned_key = key.to_string();
                    let fut = make();
                    let handle = tokio::spawn(async move {
                        let output = fut.await;
                        table
                            .lock()
                            .unwrap_or_else(|p| p.into_inner())
                            .remove(&owned_key);
                        output
                    });
                    let flight = handle
                        .map(|joined| joined.map_err(|e| FlightAborted(e.to_string())))
                        .boxed()
                        .shared();
                    in_flight.insert(key.to_string(), flight.clone());
                    flight
                }
            }
        };

        flight.await
    }
}
