//! Mock AVR TCP server for integration testing.
//!
//! Speaks enough of the line-oriented control protocol to exercise the
//! client end-to-end without real hardware: power, volume, mute, source and
//! device-identity queries, plus frame injection for asynchronous status
//! updates.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Sentinel pushed through the injection channel to drop the connection.
const CLOSE_SENTINEL: &str = "\0close";

#[derive(Default)]
struct AvrState {
    power: bool,
    volume: i64,
}

pub struct MockAvrServer {
    pub addr: SocketAddr,
    inject: broadcast::Sender<String>,
    commands: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl MockAvrServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (inject, _) = broadcast::channel(64);
        let commands: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(accept_loop(listener, inject.clone(), commands.clone()));
        MockAvrServer { addr, inject, commands, task }
    }

    /// Push an asynchronous status frame to the connected client.
    pub fn inject(&self, frame: &str) {
        let _ = self.inject.send(frame.to_string());
    }

    /// Drop the current connection; the accept loop keeps running.
    pub fn close_connection(&self) {
        let _ = self.inject.send(CLOSE_SENTINEL.to_string());
    }

    /// Commands received so far, in arrival order.
    pub fn received_commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for MockAvrServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    inject: broadcast::Sender<String>,
    commands: Arc<Mutex<Vec<String>>>,
) {
    loop {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        handle_connection(stream, inject.subscribe(), commands.clone()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    mut inject: broadcast::Receiver<String>,
    commands: Arc<Mutex<Vec<String>>>,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut buf: Vec<u8> = Vec::new();
    let mut state = AvrState { power: false, volume: 121 };

    loop {
        buf.clear();
        tokio::select! {
            frame = inject.recv() => match frame {
                Ok(frame) if frame == CLOSE_SENTINEL => break,
                Ok(frame) => {
                    if write_half.write_all(format!("{frame}\r\n").as_bytes()).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            result = reader.read_until(b'\r', &mut buf) => match result {
                Ok(0) => break,
                Ok(_) => {
                    let command = String::from_utf8_lossy(&buf)
                        .trim_matches(|c| c == '\r' || c == '\n')
                        .to_string();
                    if command.is_empty() {
                        continue;
                    }
                    commands.lock().unwrap().push(command.clone());
                    for response in respond(&command, &mut state) {
                        if write_half.write_all(format!("{response}\r\n").as_bytes()).await.is_err() {
                            return;
                        }
                    }
                }
                Err(_) => break,
            },
        }
    }
}

fn respond(command: &str, state: &mut AvrState) -> Vec<String> {
    match command {
        "?P" => vec![format!("PWR{}", u8::from(!state.power))],
        "PO" => {
            state.power = true;
            vec!["PWR0".to_string()]
        }
        "PF" => {
            state.power = false;
            vec!["PWR1".to_string()]
        }
        "?AP" => vec!["APR1".to_string()],
        "?V" => vec![format!("VOL{:03}", state.volume)],
        "?ZV" => vec!["ZV081".to_string()],
        "VU" => {
            state.volume += 1;
            vec![format!("VOL{:03}", state.volume)]
        }
        "VD" => {
            state.volume -= 1;
            vec![format!("VOL{:03}", state.volume)]
        }
        "?M" => vec!["MUT1".to_string()],
        "?Z2M" => vec!["Z2MUT1".to_string()],
        "?F" => vec!["FN25".to_string()],
        "?ZS" => vec!["Z2F04".to_string()],
        "?S" => vec!["SR0001".to_string()],
        // an unrelated status frame interleaves ahead of the model response
        "?RGD" => vec!["VOL100".to_string(), "RGD<VSX-930/B>".to_string()],
        "?SVB" => vec!["SVB00059A3C7A00".to_string()],
        "?SSI" => vec!["SSI\"1.368\"".to_string()],
        _ if command.starts_with("?RGB") => match &command[4..] {
            "01" => vec!["RGB011CD".to_string()],
            "02" => vec!["RGB021TUNER".to_string()],
            _ => vec!["E06".to_string()],
        },
        _ if command.ends_with("VL") => {
            if let Ok(volume) = command[..command.len() - 2].parse::<i64>() {
                state.volume = volume;
            }
            vec![format!("VOL{:03}", state.volume)]
        }
        _ => vec!["E04".to_string()],
    }
}
