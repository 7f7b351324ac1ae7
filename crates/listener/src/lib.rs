//! Ingest pipeline: a SUB socket feeds gzip-compressed ARNU envelopes into a
//! bounded work queue drained by worker tasks. Every failure is confined to
//! the message that caused it; the pipeline itself keeps running.

use std::{error, fmt, io::Read, result, sync::Arc};

use arnu::Action;
use config::{ConfigError, Configuration};
use flate2::read::GzDecoder;
use iff::{IffError, IffSource};
use store::{RedisKeyspace, ServiceStore, Statistics, StoreError, StoreTier};
use tokio::sync::{mpsc, Mutex};
use zeromq::{Socket, SocketRecv, SubSocket, ZmqMessage};

#[derive(Debug)]
pub enum ListenerError {
    Config(ConfigError),
    Store(StoreError),
    Database(IffError),
    Transport(zeromq::ZmqError),
}

impl fmt::Display for ListenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerError::Config(why) => write!(f, "{why}"),
            ListenerError::Store(why) => write!(f, "{why}"),
            ListenerError::Database(why) => write!(f, "{why}"),
            ListenerError::Transport(why) => write!(f, "transport error: {why}"),
        }
    }
}

impl error::Error for ListenerError {}

impl From<ConfigError> for ListenerError {
    fn from(why: ConfigError) -> Self {
        ListenerError::Config(why)
    }
}

impl From<StoreError> for ListenerError {
    fn from(why: StoreError) -> Self {
        ListenerError::Store(why)
    }
}

impl From<IffError> for ListenerError {
    fn from(why: IffError) -> Self {
        ListenerError::Database(why)
    }
}

impl From<zeromq::ZmqError> for ListenerError {
    fn from(why: zeromq::ZmqError) -> Self {
        ListenerError::Transport(why)
    }
}

pub type Result<T> = result::Result<T, ListenerError>;

/// Receives multi-frame messages until interrupted. The composition root
/// owns the socket and the queue; workers only see their receiving end.
pub async fn run(configuration: &Configuration) -> Result<()> {
    let arnu_source = configuration.arnu_source()?;
    let keyspace = RedisKeyspace::connect(&configuration.schedule_store.url()).await?;

    let (sender, receiver) = mpsc::channel::<Vec<u8>>(arnu_source.queue_size.max(1));
    let receiver = Arc::new(Mutex::new(receiver));

    let mut workers = Vec::new();
    for worker_id in 0..arnu_source.workers.max(1) {
        // Each worker owns its own timetable connection pool.
        let worker = Worker {
            store: ServiceStore::new(keyspace.clone()),
            statistics: Statistics::new(keyspace.clone()),
            iff: IffSource::connect(configuration.iff_database()?)?,
        };
        workers.push(tokio::spawn(worker_loop(
            worker_id,
            worker,
            Arc::clone(&receiver),
        )));
    }

    let mut socket = SubSocket::new();
    socket.connect(&arnu_source.socket).await?;
    socket.subscribe("").await?;
    log::info!("Listening for ARNU messages on {}", arnu_source.socket);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down...");
                break;
            }
            message = socket.recv() => match message {
                Ok(message) => enqueue(&sender, message),
                Err(why) => {
                    log::error!("Error occured in receive loop: {why}");
                    break;
                }
            }
        }
    }

    // Closing the queue lets in-flight worker messages complete.
    drop(sender);
    for worker in workers {
        let _ = worker.await;
    }
    socket.close().await;

    Ok(())
}

/// Frames after the topic frame hold the compressed payload. When the work
/// queue is full the message is dropped with a warning; the socket itself
/// carries no high-water mark.
fn enqueue(sender: &mpsc::Sender<Vec<u8>>, message: ZmqMessage) {
    let frames = message.into_vec();
    if frames.len() < 2 {
        log::warn!("Ignoring message with {} frame(s)", frames.len());
        return;
    }

    let mut payload = Vec::new();
    for frame in &frames[1..] {
        payload.extend_from_slice(frame);
    }

    match sender.try_send(payload) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(_)) => {
            log::warn!("Work queue full, dropping message");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            log::error!("Work queue closed, dropping message");
        }
    }
}

struct Worker {
    store: ServiceStore<RedisKeyspace>,
    statistics: Statistics<RedisKeyspace>,
    iff: IffSource,
}

async fn worker_loop(worker_id: usize, worker: Worker, receiver: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>) {
    log::info!("Worker {worker_id} started");

    loop {
        let message = { receiver.lock().await.recv().await };
        match message {
            Some(message) => worker.process(&message).await,
            None => break,
        }
    }

    log::info!("Worker {worker_id} finished");
}

impl Worker {
    async fn process(&self, message: &[u8]) {
        let Some(content) = decompress(message) else {
            return;
        };

        if let Err(why) = self.statistics.increment_processed_messages().await {
            log::error!("Cannot update message counter: {why}");
        }

        let services = match arnu::parse_message(&content, &self.iff).await {
            Ok(services) => services,
            Err(why) => {
                log::error!("ARNU message not processed: {why}");
                return;
            }
        };

        for (service, action) in services {
            let applied = match action {
                Action::Store => self.store.store(&service, StoreTier::Actual).await,
                Action::Remove => self
                    .store
                    .delete(
                        &service.servicedate_str(),
                        &service.servicenumber,
                        StoreTier::Actual,
                    )
                    .await
                    .map(|_| ()),
            };

            match applied {
                Ok(()) => {
                    log::debug!("New information for service {}", service.service_id);
                    if let Err(why) = self.statistics.increment_processed_services().await {
                        log::error!("Cannot update service counter: {why}");
                    }
                }
                Err(why) => {
                    log::error!("Service {} not updated: {why}", service.service_id);
                }
            }
        }
    }
}

fn decompress(message: &[u8]) -> Option<String> {
    let mut content = String::new();
    match GzDecoder::new(message).read_to_string(&mut content) {
        Ok(_) => Some(content),
        Err(why) => {
            log::warn!(
                "Error while unzipping message: {why} (message length: {})",
                message.len()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn decompress_round_trip() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"<PutServiceInfoIn/>").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(
            decompress(&compressed).as_deref(),
            Some("<PutServiceInfoIn/>")
        );
    }

    #[test]
    fn decompress_rejects_garbage() {
        assert!(decompress(b"certainly not gzip").is_none());
    }
}
