//! Batch buffer: two class-partitioned buffers flushed at a size threshold

use serde_json::Value;

/// Where a source record's feature graph lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    /// Embedded in the record itself
    Inline,
    /// Stored as a blob object keyed by the record's identifier
    External,
}

impl RecordClass {
    /// Route by `routing_attribute`: `1`, `true` or `"1"` select external.
    pub fn of(record: &Value, routing_attribute: &str) -> Self {
        let external = match record.get(routing_attribute) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64() == Some(1.0),
            Some(Value::String(s)) => matches!(s.trim(), "1" | "true"),
            _ => false,
        };
        if external {
            RecordClass::External
        } else {
            RecordClass::Inline
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordClass::Inline => "inline",
            RecordClass::External => "external",
        }
    }
}

/// Receives full batches from the dispatcher.
pub trait BatchProcessor {
    fn process(&mut self, class: RecordClass, batch: Vec<Value>) -> anyhow::Result<()>;
}

/// Flushes handed to the processor, per class.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushCounts {
    pub inline: usize,
    pub external: usize,
}

pub struct Dispatcher<P> {
    processor: P,
    threshold: usize,
    inline: Vec<Value>,
    external: Vec<Value>,
    flushes: FlushCounts,
}

impl<P: BatchProcessor> Dispatcher<P> {
    pub fn new(processor: P, threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            processor,
            threshold,
            inline: Vec::with_capacity(threshold),
            external: Vec::with_capacity(threshold),
            flushes: FlushCounts::default(),
        }
    }

    /// Append to the buffer of `class`, keeping arrival order.
    pub fn add(&mut self, class: RecordClass, record: Value) {
        self.buffer_mut(class).push(record);
    }

    /// Flush every buffer that reached the threshold.
    pub fn maybe_flush(&mut self) -> anyhow::Result<()> {
        for class in [RecordClass::Inline, RecordClass::External] {
            if self.pending(class) >= self.threshold {
                log::info!(
                    "{} buffer reached {}, flushing",
                    class.name(),
                    self.threshold
                );
                self.flush(class)?;
            }
        }
        Ok(())
    }

    /// Hand the buffer of `class` to the processor. The buffer is empty
    /// afterwards whether or not processing succeeded.
    pub fn flush(&mut self, class: RecordClass) -> anyhow::Result<()> {
        let batch = std::mem::take(self.buffer_mut(class));
        if batch.is_empty() {
            return Ok(());
        }
        match class {
            RecordClass::Inline => self.flushes.inline += 1,
            RecordClass::External => self.flushes.external += 1,
        }
        log::debug!("flushing {} {} records", batch.len(), class.name());
        self.processor.process(class, batch)
    }

    /// Flush whatever remains at end of scan.
    pub fn flush_all(&mut self) -> anyhow::Result<()> {
        self.flush(RecordClass::Inline)?;
        self.flush(RecordClass::External)
    }

    pub fn pending(&self, class: RecordClass) -> usize {
        match class {
            RecordClass::Inline => self.inline.len(),
            RecordClass::External => self.external.len(),
        }
    }

    pub fn flushes(&self) -> FlushCounts {
        self.flushes
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn into_processor(self) -> P {
        self.processor
    }

    fn buffer_mut(&mut self, class: RecordClass) -> &mut Vec<Value> {
        match class {
            RecordClass::Inline => &mut self.inline,
            RecordClass::External => &mut self.external,
        }
    }
}
