#![allow(dead_code)]

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context as TaskContext, Poll};

use async_trait::async_trait;
use liquid_rs::{Context, Error, FileSystem, Filter, FilterArgs, Liquid, MemoryFs, Options, Value};

/// Engine with default options and no partials.
pub fn engine() -> Liquid {
    Liquid::new(Options::default())
}

/// Engine whose partials come from `files`, with `.liquid` appended
/// to bare names.
pub fn engine_with_files(files: &[(&str, &str)]) -> Liquid {
    Liquid::with_fs(liquid_options(), Arc::new(memory_fs(files)))
}

pub fn liquid_options() -> Options {
    Options {
        extname: ".liquid".to_string(),
        ..Options::default()
    }
}

pub fn memory_fs(files: &[(&str, &str)]) -> MemoryFs {
    files
        .iter()
        .fold(MemoryFs::new(), |fs, (path, text)| fs.with_file(path, *text))
}

/// Parse and render `text` with the synchronous driver, panicking on
/// any error.
pub fn render(text: &str, data: serde_json::Value) -> String {
    let engine = engine();
    let template = engine
        .parse(text, None)
        .unwrap_or_else(|e| panic!("failed to parse {text:?}: {e}"));
    engine
        .render(&template, data)
        .unwrap_or_else(|e| panic!("failed to render {text:?}: {e}"))
}

/// Parse and render with `engine`, returning the render result.
pub fn try_render(engine: &Liquid, text: &str, data: serde_json::Value) -> Result<String, Error> {
    let template = engine.parse(text, None)?;
    engine.render(&template, data)
}

/// `MemoryFs` wrapper that counts file reads.
#[derive(Debug)]
pub struct CountingFs {
    inner: MemoryFs,
    reads: Arc<AtomicUsize>,
}

impl CountingFs {
    pub fn new(inner: MemoryFs) -> (Self, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                reads: Arc::clone(&reads),
            },
            reads,
        )
    }
}

#[async_trait(?Send)]
impl FileSystem for CountingFs {
    fn exists_sync(&self, path: &str) -> bool {
        self.inner.exists_sync(path)
    }

    fn read_file_sync(&self, path: &str) -> io::Result<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_file_sync(path)
    }
}

/// Future that is pending on its first poll and ready on the second.
pub struct YieldOnce(bool);

impl YieldOnce {
    pub const fn new() -> Self {
        Self(false)
    }
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<()> {
        if self.0 {
            Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

/// Filter that suspends once before upper-casing its input.
#[derive(Debug)]
pub struct SlowUpcase;

#[async_trait(?Send)]
impl Filter for SlowUpcase {
    async fn call(
        &self,
        input: Value,
        _args: &FilterArgs,
        _ctx: &Context<'_>,
    ) -> Result<Value, Error> {
        YieldOnce::new().await;
        Ok(input.to_output().to_uppercase().into())
    }
}

/// `repeat: n` filter that charges its output size before building it.
pub fn register_repeat(engine: &mut Liquid) {
    engine.register_filter_fn("repeat", |input, args, ctx| {
        let times = args
            .get(0)
            .and_then(Value::as_integer)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(1);
        let text = input.to_output();
        ctx.charge(text.len() * times)?;
        Ok(text.repeat(times).into())
    });
}
