use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, error};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Chain;
use crate::core::{OwnedBatch, Receiver, StreamDescriptor};

/// Work item handed to a running chain
#[derive(Debug, Clone)]
pub enum Command {
    Negotiate(StreamDescriptor),
    Frames(OwnedBatch),
    Reset,
    Finalize(f64),
}

/// Producer of owned frame batches for a chain
#[async_trait]
pub trait FrameSource: Send {
    /// Shape of the batches this source yields
    fn descriptor(&self) -> StreamDescriptor;

    /// Next batch, `None` once the source is exhausted
    async fn next_batch(&mut self) -> Result<Option<OwnedBatch>>;

    /// Time in ms at which the input ends
    fn end_time(&self) -> f64;
}

/// Negotiate `chain` for `source`, push the whole source through it and
/// finalize at the source end time
pub async fn drive<R: Receiver>(chain: &mut Chain<R>, source: &mut dyn FrameSource) -> Result<()> {
    chain.negotiate(&source.descriptor())?;
    while let Some(batch) = source.next_batch().await? {
        chain.process(&batch.as_batch())?;
    }
    chain.finalize(source.end_time())
}

/// A chain moved into its own tokio task, fed through a bounded channel.
///
/// Commands are applied in order. The first failing command ends the task;
/// the error is returned from [`StreamRunner::join`] and later sends fail.
pub struct StreamRunner<R: Receiver> {
    tx: mpsc::Sender<Command>,
    handle: JoinHandle<Result<Chain<R>>>,
}

impl<R: Receiver + Send + 'static> StreamRunner<R> {
    pub fn spawn(chain: Chain<R>, channel_capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Command>(channel_capacity.max(1));

        let handle = tokio::spawn(async move {
            let mut chain = chain;
            while let Some(command) = rx.recv().await {
                let result = match command {
                    Command::Negotiate(input) => chain.negotiate(&input).map(|_| ()),
                    Command::Frames(batch) => chain.process(&batch.as_batch()),
                    Command::Reset => chain.reset(),
                    Command::Finalize(input_end) => chain.finalize(input_end),
                };
                if let Err(e) = result {
                    error!("stream runner stopped: {:#}", e);
                    return Err(e);
                }
            }
            debug!("stream runner drained");
            Ok(chain)
        });

        Self { tx, handle }
    }

    async fn send_command(&self, command: Command) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| anyhow!("stream runner is no longer running"))
    }

    pub async fn negotiate(&self, input: StreamDescriptor) -> Result<()> {
        self.send_command(Command::Negotiate(input)).await
    }

    pub async fn send(&self, batch: OwnedBatch) -> Result<()> {
        self.send_command(Command::Frames(batch)).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.send_command(Command::Reset).await
    }

    pub async fn finalize(&self, input_end: f64) -> Result<()> {
        self.send_command(Command::Finalize(input_end)).await
    }

    /// Queue everything `source` yields, then its finalize
    pub async fn feed(&self, source: &mut dyn FrameSource) -> Result<()> {
        self.negotiate(source.descriptor()).await?;
        while let Some(batch) = source.next_batch().await? {
            self.send(batch).await?;
        }
        self.finalize(source.end_time()).await
    }

    /// Close the command channel and wait for the queued commands. Returns
    /// the chain, or the error that stopped it.
    pub async fn join(self) -> Result<Chain<R>> {
        drop(self.tx);
        self.handle.await?
    }
}
