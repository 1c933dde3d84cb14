use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::message::Message;
use super::topic::{Observer, Subscriber};

/// Observer that keeps every message it is notified with.
#[derive(Default)]
pub struct RecordingObserver {
    messages: Mutex<Vec<Message>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }
}

impl Observer for RecordingObserver {
    fn notify(&self, msg: &Message) {
        self.messages.lock().unwrap().push(msg.clone());
    }
}

/// Observer that forwards every message into a channel.
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<Message>,
}

impl ChannelObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Message>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), receiver)
    }
}

impl Observer for ChannelObserver {
    fn notify(&self, msg: &Message) {
        let _ = self.sender.send(msg.clone());
    }
}

pub fn subscriber<O: Observer + 'static>(observer: &Arc<O>) -> Subscriber {
    observer.clone()
}
