//! src/record.rs
use std::io::{BufWriter, Read, Write};

/// A single key/value pair flowing through the engine: emitted by mappers,
/// grouped for reducers, and carried through the merge. Both sides are
/// arbitrary text; an empty value is legal. Hashing uses the key only.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a over the key's UTF-8 bytes, masked to the low 27 bits.
/// Partition assignment is `ihash(key) % n_reduce`; the mask keeps the
/// assignment identical across every node of a job.
pub fn ihash(key: &str) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in key.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash & 0x7ff_ffff
}

/// Writes a stream of records as newline-separated JSON values. The format is
/// internal to the engine; the decoder side is [`read_records`].
pub struct RecordWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        RecordWriter {
            writer: BufWriter::new(inner),
        }
    }

    pub fn write(&mut self, record: &KeyValue) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flushes buffered records. Must be called before the underlying file is
    /// considered complete.
    pub fn finish(mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Decodes records until end of stream, mirroring the writer's encoding.
pub fn read_records<R: Read>(
    reader: R,
) -> impl Iterator<Item = Result<KeyValue, serde_json::Error>> {
    serde_json::Deserializer::from_reader(reader).into_iter::<KeyValue>()
}
