use std::borrow::Cow;
use std::collections::VecDeque;

/// Receive callback invoked once per chunk while streaming.
pub type RecvCallback<'a> = Box<dyn FnMut(&mut WriteBuffer) + 'a>;

/// Accumulates received bytes for one transfer.
///
/// While streaming, the same buffer is handed to the receive callback after
/// every chunk. The callback may consume or reset the data, queue outgoing
/// messages with [`stream_write`](Self::stream_write) and ask for the stream
/// to end with [`stream_close`](Self::stream_close).
#[derive(Debug, Default)]
pub struct WriteBuffer {
    data: Vec<u8>,
    outgoing: VecDeque<Vec<u8>>,
    close_requested: bool,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Buffered data decoded lossily as UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Remove and return everything buffered so far.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    /// Remove and return the first line (without its line ending).
    ///
    /// Without a newline in the buffer the whole buffer is returned.
    pub fn take_line(&mut self) -> Vec<u8> {
        let mut line = match self.data.iter().position(|&b| b == b'\n') {
            Some(end) => {
                let rest = self.data.split_off(end + 1);
                std::mem::replace(&mut self.data, rest)
            }
            None => self.take(),
        };
        while matches!(line.last(), Some(b'\n' | b'\r')) {
            line.pop();
        }
        line
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Queue a message to send on the active stream.
    pub fn stream_write(&mut self, message: impl Into<Vec<u8>>) {
        self.outgoing.push_back(message.into());
    }

    /// Ask for the active stream to be closed.
    pub fn stream_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    pub(crate) fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    pub(crate) fn take_outgoing(&mut self) -> VecDeque<Vec<u8>> {
        std::mem::take(&mut self.outgoing)
    }

    pub(crate) fn pending_outgoing(&self) -> usize {
        self.outgoing.len()
    }
}
