//! Streaming API: observe a run as a `Stream` of [`PipelineEvent`]s.
//!
//! [`process_stream`] spawns the run on the tokio runtime with a channel
//! observer attached and hands back the receiving end. Events arrive in
//! exactly the order the controller publishes them; the stream ends when
//! the run finishes and the spawned task drops its pipeline.
//!
//! The task's [`JoinHandle`] resolves to the final [`Snapshot`] together
//! with the [`RunSummary`] (or the fatal error), so records can still be
//! exported afterwards.

use crate::controller::{Pipeline, PipelineBuilder};
use crate::error::PipelineError;
use crate::output::{OverallStatus, PageRecord, RunSummary, Snapshot};
use crate::pipeline::input::Document;
use crate::progress::{PipelineEvent, PipelineObserver};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;

/// A boxed stream of pipeline events.
pub type EventStream = Pin<Box<dyn Stream<Item = PipelineEvent> + Send>>;

/// Final state of a streamed run and its outcome.
pub type StreamedRun = JoinHandle<(Snapshot, Result<RunSummary, PipelineError>)>;

/// Forwards every observer call into an unbounded channel.
///
/// Sends never block the controller; a dropped receiver just discards events.
struct ChannelObserver(mpsc::UnboundedSender<PipelineEvent>);

impl PipelineObserver for ChannelObserver {
    fn on_cleared(&self) {
        let _ = self.0.send(PipelineEvent::Cleared);
    }

    fn on_status_changed(&self, status: &OverallStatus) {
        let _ = self.0.send(PipelineEvent::StatusChanged {
            status: status.clone(),
        });
    }

    fn on_pages_created(&self, records: &[PageRecord]) {
        let _ = self.0.send(PipelineEvent::PagesCreated {
            records: records.to_vec(),
        });
    }

    fn on_page_updated(&self, index: usize, record: &PageRecord) {
        let _ = self.0.send(PipelineEvent::PageUpdated {
            index,
            record: record.clone(),
        });
    }
}

fn attach(builder: PipelineBuilder) -> (Pipeline, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pipeline = builder.observer(Arc::new(ChannelObserver(tx))).build();
    (pipeline, Box::pin(UnboundedReceiverStream::new(rx)))
}

/// Process `document` on a spawned task, streaming its events.
///
/// Must be called from within a tokio runtime.
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use pdf2png::{process_stream, Document, PdfiumRasterizer, Pipeline, PipelineEvent};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let builder = Pipeline::builder().rasterizer(Arc::new(PdfiumRasterizer::new()));
/// let document = Document::from_path("report.pdf").await?;
/// let (mut events, run) = process_stream(builder, document);
/// while let Some(event) = events.next().await {
///     if let PipelineEvent::PageUpdated { record, .. } = event {
///         println!("{} → {}", record.filename, record.status);
///     }
/// }
/// let (_snapshot, summary) = run.await?;
/// println!("{} pages", summary?.pages);
/// # Ok(())
/// # }
/// ```
pub fn process_stream(builder: PipelineBuilder, document: Document) -> (EventStream, StreamedRun) {
    let (mut pipeline, events) = attach(builder);
    let handle = tokio::spawn(async move {
        let result = pipeline.process_document(document).await;
        (pipeline.snapshot(), result)
    });
    (events, handle)
}

/// Like [`process_stream`], reading `input` (path or URL) first.
pub fn process_input_stream(
    builder: PipelineBuilder,
    input: impl Into<String>,
) -> (EventStream, StreamedRun) {
    let input = input.into();
    let (mut pipeline, events) = attach(builder);
    let handle = tokio::spawn(async move {
        let result = pipeline.process_input(&input).await;
        (pipeline.snapshot(), result)
    });
    (events, handle)
}
