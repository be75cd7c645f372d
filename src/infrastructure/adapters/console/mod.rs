//! Console adapter for development/testing
//!
//! Every stdin line is one event in the `console` conversation. Text replies
//! are printed; images are written to the output directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::application::errors::TransportError;
use crate::domain::entities::{ConversationId, InboundEvent, RenderedImage, Reply};
use crate::domain::traits::Transport;

pub struct ConsoleTransport<R = BufReader<Stdin>> {
    conversation: ConversationId,
    output_dir: PathBuf,
    lines: Mutex<Lines<R>>,
}

impl ConsoleTransport {
    pub fn stdin(output_dir: impl Into<PathBuf>) -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), output_dir)
    }
}

impl<R: AsyncBufRead + Unpin + Send> ConsoleTransport<R> {
    pub fn new(reader: R, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            conversation: ConversationId::new("console"),
            output_dir: output_dir.into(),
            lines: Mutex::new(reader.lines()),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write an image under a fresh name and return its path
    pub async fn save_image(&self, image: &RenderedImage) -> Result<PathBuf, TransportError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self
            .output_dir
            .join(format!("{}.{}", uuid::Uuid::new_v4(), image.format().extension()));
        tokio::fs::write(&path, image.bytes()).await?;
        Ok(path)
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send + 'static> Transport for ConsoleTransport<R> {
    fn name(&self) -> &str {
        "console"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        tracing::info!("Starting console bot (dev mode), images go to {}", self.output_dir.display());
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError> {
        let mut lines = self.lines.lock().await;
        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            return Ok(Some(InboundEvent::new(self.conversation.clone(), text).with_sender("console")));
        }
        Ok(None)
    }

    async fn send(&self, _conversation: &ConversationId, reply: Reply) -> Result<(), TransportError> {
        match reply {
            Reply::Text(text) => println!("[BOT] {}", text),
            Reply::Image { image, caption } => {
                let path = self.save_image(&image).await?;
                match caption {
                    Some(caption) => println!("[BOT] {} ({})", caption, path.display()),
                    None => println!("[BOT] image {}x{} saved to {}", image.width(), image.height(), path.display()),
                }
            }
        }
        Ok(())
    }

    async fn disconnect(&self) {
        tracing::info!("Console bot stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::ImageFormat;

    #[tokio::test]
    async fn test_lines_become_events() {
        let input: &[u8] = b"!ping\n\n   \n  !render hi  \n";
        let transport = ConsoleTransport::new(input, "unused");

        let first = transport.next_event().await.unwrap().unwrap();
        assert_eq!(first.text, "!ping");
        assert_eq!(first.conversation.as_str(), "console");
        assert_eq!(first.sender.as_deref(), Some("console"));

        let second = transport.next_event().await.unwrap().unwrap();
        assert_eq!(second.text, "!render hi");

        assert!(transport.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_image_reply_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("renders");
        let transport = ConsoleTransport::new(&b""[..], &out);

        let image = RenderedImage::new(vec![1, 2, 3], ImageFormat::Jpeg, 4, 4);
        let path = transport.save_image(&image).await.unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);

        transport.send(&"console".into(), Reply::image(image)).await.unwrap();
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 2);
    }
}
