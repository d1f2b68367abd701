//! UseCase: 接続レジストリとブロードキャスト
//!
//! ## 責務
//!
//! - 接続中の Connection を ID をキーに保持する（レジストリはハブだけが所有）
//! - 参加・退出の通知、受信メッセージのファンアウト
//!
//! ## 並行性
//!
//! レジストリは `Mutex` で保護し、ロックは追加・削除と送信先スナップショットの
//! 取得の間だけ保持します。送信はロック解放後に宛先ごとに独立して行い、
//! 各送信はタイムアウトで打ち切ります。
//!
//! ## 配送の保証
//!
//! at-most-once のベストエフォート。失敗した宛先はスキップされ、再送はしません。

use std::{collections::HashMap, sync::Arc, time::Duration};

use agora_shared::time::Clock;
use futures_util::future::join_all;
use tokio::sync::Mutex;

use crate::{
    domain::{Connection, ConnectionId, ConnectionIdFactory, Event, HubError, SendError, Timestamp},
    infrastructure::dto::conversion::{decode_inbound_message, encode_event},
};

/// 宛先 1 件あたりの送信タイムアウトの既定値
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// 接続レジストリとファンアウト配送を担うハブ
pub struct ConnectionHub {
    registry: Mutex<HashMap<ConnectionId, Arc<dyn Connection>>>,
    id_factory: ConnectionIdFactory,
    clock: Arc<dyn Clock>,
    send_timeout: Duration,
}

impl ConnectionHub {
    /// 新しい ConnectionHub を作成
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            registry: Mutex::new(HashMap::new()),
            id_factory: ConnectionIdFactory::new(),
            clock,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    /// 宛先ごとの送信タイムアウトを変更
    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.send_timeout = send_timeout;
        self
    }

    /// 新しく受け付けた接続の ID を発行
    pub fn next_connection_id(&self) -> ConnectionId {
        self.id_factory.generate()
    }

    /// 接続を登録し、他の接続に参加を通知
    ///
    /// 参加した接続自身には参加通知を送りません。
    ///
    /// # Errors
    ///
    /// 同じ ID の接続が登録済みの場合は `HubError::DuplicateIdentifier` を返します。
    /// 既存の登録はそのまま残ります。
    pub async fn register(&self, connection: Arc<dyn Connection>) -> Result<(), HubError> {
        let id = connection.id().clone();
        {
            let mut registry = self.registry.lock().await;
            if registry.contains_key(&id) {
                tracing::warn!("Connection '{}' is already registered. Rejecting.", id);
                return Err(HubError::DuplicateIdentifier(id.into_string()));
            }
            registry.insert(id.clone(), connection);
        }
        tracing::info!("New connection '{}' registered", id);

        self.broadcast_except(&Event::joined(&id), Some(&id)).await;
        Ok(())
    }

    /// 接続を削除し、残りの接続に退出を通知
    ///
    /// 未登録の ID を指定した場合は何もしません。
    pub async fn unregister(&self, id: &ConnectionId) {
        let removed = self.registry.lock().await.remove(id);
        if removed.is_none() {
            tracing::debug!("Connection '{}' was not registered, nothing to remove", id);
            return;
        }
        tracing::info!("Connection '{}' closed and removed from registry", id);

        self.broadcast(&Event::left(id)).await;
    }

    /// 登録済みの接続から届いたペイロードを処理
    ///
    /// 構造化メッセージとして読めればその `message` を、読めなければ生テキストを
    /// 本文とします。sender と timestamp は常にハブが付与します。
    /// 作成したイベントは送信者を含む全接続に配送します。
    pub async fn dispatch(&self, id: &ConnectionId, raw: &str) {
        if !self.registry.lock().await.contains_key(id) {
            tracing::warn!("Dropping payload from unregistered connection '{}'", id);
            return;
        }

        let message = decode_inbound_message(raw);
        tracing::info!("Message received from '{}': {}", id, message);

        let timestamp = Timestamp::new(self.clock.now_epoch_secs());
        let event = Event::chat(message, id.clone(), timestamp);
        self.broadcast(&event).await;
    }

    /// open な全接続にイベントを配送
    pub async fn broadcast(&self, event: &Event) {
        self.broadcast_except(event, None).await;
    }

    /// 登録済みの接続数
    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// 登録済みの接続 ID（昇順）
    pub async fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.registry.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn broadcast_except(&self, event: &Event, exclude: Option<&ConnectionId>) {
        let payload = match encode_event(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("Failed to encode event: {}", e);
                return;
            }
        };

        // 送信中に register / unregister をブロックしないようスナップショットを取る
        let recipients: Vec<Arc<dyn Connection>> = {
            let registry = self.registry.lock().await;
            registry
                .values()
                .filter(|connection| exclude.is_none_or(|excluded| connection.id() != excluded))
                .cloned()
                .collect()
        };

        let deliveries = recipients
            .iter()
            .filter(|connection| {
                let open = connection.is_open();
                if !open {
                    tracing::debug!("Skipping closed connection '{}'", connection.id());
                }
                open
            })
            .map(|connection| self.deliver(Arc::as_ref(connection), &payload));
        let delivered = join_all(deliveries)
            .await
            .into_iter()
            .filter(|ok| *ok)
            .count();

        tracing::debug!(
            "Broadcasted event to {}/{} connections",
            delivered,
            recipients.len()
        );
    }

    async fn deliver(&self, connection: &dyn Connection, payload: &str) -> bool {
        let result = match tokio::time::timeout(self.send_timeout, connection.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::TimedOut),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send event to connection '{}': {}", connection.id(), e);
                false
            }
        }
    }
}
