use std::future::Future;

use log::info;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Line terminator the modem expects after each command
pub const LINE_TERMINATOR: &str = "\r\n";

/// The link to the radio modem.
///
/// It takes command lines as they are and enforces no protocol of its own.
/// There is no acknowledgement: a completed call only means the bytes were
/// handed over.
pub trait UplinkTransport {
    fn send_command(&mut self, command: &str) -> impl Future<Output = anyhow::Result<()>>;
}

/// Writes commands to a serial port, or anything else that accepts bytes
pub struct SerialTransport<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> SerialTransport<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin> UplinkTransport for SerialTransport<W> {
    async fn send_command(&mut self, command: &str) -> anyhow::Result<()> {
        info!("uplink: TX {command}");
        self.writer.write_all(command.as_bytes()).await?;
        self.writer.write_all(LINE_TERMINATOR.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_commands_are_terminated() {
    let mut transport = SerialTransport::new(Vec::new());
    transport.send_command("AT$RC").await.unwrap();
    transport.send_command("AT$SF=4B").await.unwrap();
    assert_eq!(transport.get_ref().as_slice(), b"AT$RC\r\nAT$SF=4B\r\n");
}
