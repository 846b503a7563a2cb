use crate::config::ConfigHandle;
use async_trait::async_trait;
use minecraft_client_rs::Client;
use tokio::task;

#[derive(Debug, thiserror::Error)]
pub enum RconError {
    #[error("Minecraft server not configured")]
    NotConfigured,
    #[error("could not connect to {address}: {cause}")]
    Connection { address: String, cause: String },
    #[error("failed to authenticate Minecraft RCON: {0}")]
    Authentication(String),
    #[error("RCON connection ended unexpectedly: {0}")]
    Command(String),
    #[error("RCON session aborted: {0}")]
    Task(#[from] task::JoinError),
}

/// A remote console able to run one command against the game server.
#[async_trait]
pub trait Console: Send + Sync {
    async fn execute(&self, command: &str) -> Result<String, RconError>;
}

/// Opens a fresh authenticated RCON connection for every command, using the
/// server settings current at the time of the call. Sessions are independent:
/// a server that never answers only stalls the command that reached it.
pub struct RconClient {
    config: ConfigHandle,
}

impl RconClient {
    pub fn new(config: ConfigHandle) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Console for RconClient {
    async fn execute(&self, command: &str) -> Result<String, RconError> {
        let server = self.config.minecraft();

        if !server.is_configured() {
            return Err(RconError::NotConfigured);
        }

        let address = server.address();
        let password = server.password;
        let command = command.to_owned();

        tracing::debug!("Running `{}` on {}", command, address);

        task::spawn_blocking(move || {
            let mut session = Session::connect(address)?;
            session.authenticate(password)?;
            session.send_command(command)
        })
        .await?
    }
}

/// Connected RCON client, closed when dropped.
struct Session {
    client: Client,
    address: String,
}

impl Session {
    fn connect(address: String) -> Result<Self, RconError> {
        match Client::new(address.clone()) {
            Ok(client) => Ok(Self { client, address }),
            Err(e) => Err(RconError::Connection {
                address,
                cause: e.to_string(),
            }),
        }
    }

    fn authenticate(&mut self, password: String) -> Result<(), RconError> {
        self.client
            .authenticate(password)
            .map(|_| ())
            .map_err(|e| RconError::Authentication(e.to_string()))
    }

    fn send_command(&mut self, command: String) -> Result<String, RconError> {
        self.client
            .send_command(command)
            .map(|message| message.body)
            .map_err(|e| RconError::Command(e.to_string()))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.client.close() {
            tracing::debug!("Error closing RCON connection to {}: {}", self.address, e);
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::{Console, RconError};
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    /// Records every command and answers from memory.
    #[derive(Default)]
    pub struct MockConsole {
        commands: Mutex<Vec<String>>,
        failing: AtomicBool,
    }

    impl MockConsole {
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Console for MockConsole {
        async fn execute(&self, command: &str) -> Result<String, RconError> {
            self.commands.lock().unwrap().push(command.to_owned());

            match self.failing.load(Ordering::SeqCst) {
                true => Err(RconError::Connection {
                    address: "mock:25575".to_owned(),
                    cause: "connection refused".to_owned(),
                }),
                false => Ok(format!("ran {command}")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Console, RconClient, RconError};
    use crate::config::{Config, ConfigHandle, MinecraftConfig};
    use pretty_assertions::assert_eq;
    use std::{
        io::{self, Read, Write},
        net::{TcpListener, TcpStream},
        sync::{mpsc, Arc},
        thread::{self, JoinHandle},
        time::Duration,
    };
    use tempfile::TempDir;
    use tokio::time::timeout;

    const PASSWORD: &str = "s3cret";

    const TYPE_RESPONSE: i32 = 0;
    const TYPE_AUTH_RESPONSE: i32 = 2;

    enum Behaviour {
        Respond(&'static str),
        RejectAuth,
        HangUpAfterAuth,
        /// Signals once the auth packet arrived, then never answers until released.
        Hang {
            reached: mpsc::Sender<()>,
            release: mpsc::Receiver<()>,
        },
    }

    struct ServerReport {
        commands: Vec<String>,
        client_closed: bool,
    }

    fn read_packet(stream: &mut TcpStream) -> Option<(i32, String)> {
        let mut len = [0u8; 4];
        stream.read_exact(&mut len).ok()?;
        let len = i32::from_le_bytes(len) as usize;

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload).ok()?;

        let id = i32::from_le_bytes(payload[0..4].try_into().unwrap());
        let body = String::from_utf8_lossy(&payload[8..len - 2]).into_owned();
        Some((id, body))
    }

    fn write_packet(stream: &mut TcpStream, id: i32, kind: i32, body: &str) {
        let mut packet = Vec::new();
        packet.extend_from_slice(&((body.len() + 10) as i32).to_le_bytes());
        packet.extend_from_slice(&id.to_le_bytes());
        packet.extend_from_slice(&kind.to_le_bytes());
        packet.extend_from_slice(body.as_bytes());
        packet.extend_from_slice(&[0, 0]);
        stream.write_all(&packet).unwrap();
    }

    fn wait_for_close(stream: &mut TcpStream) -> bool {
        let mut buf = [0u8; 1];
        matches!(stream.read(&mut buf), Ok(0))
    }

    fn spawn_server(behaviour: Behaviour) -> (u16, JoinHandle<ServerReport>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            let mut commands = Vec::new();

            let (auth_id, password) = read_packet(&mut stream).expect("no auth packet");

            match behaviour {
                Behaviour::RejectAuth => {
                    write_packet(&mut stream, -1, TYPE_AUTH_RESPONSE, "");
                    while let Some((_, command)) = read_packet(&mut stream) {
                        commands.push(command);
                    }
                    return ServerReport {
                        commands,
                        client_closed: true,
                    };
                }
                Behaviour::Hang { reached, release } => {
                    reached.send(()).unwrap();
                    release.recv().ok();
                }
                Behaviour::HangUpAfterAuth => {
                    write_packet(&mut stream, auth_id, TYPE_AUTH_RESPONSE, "");
                    if let Some((_, command)) = read_packet(&mut stream) {
                        commands.push(command);
                    }
                }
                Behaviour::Respond(response) => {
                    assert_eq!(password, PASSWORD);
                    write_packet(&mut stream, auth_id, TYPE_AUTH_RESPONSE, "");

                    let (id, command) = read_packet(&mut stream).expect("no command packet");
                    commands.push(command);
                    write_packet(&mut stream, id, TYPE_RESPONSE, response);

                    let client_closed = wait_for_close(&mut stream);
                    return ServerReport {
                        commands,
                        client_closed,
                    };
                }
            }

            ServerReport {
                commands,
                client_closed: false,
            }
        });

        (port, handle)
    }

    fn client_for(dir: &TempDir, host: &str, port: u16, password: &str) -> RconClient {
        let config = Config {
            minecraft: MinecraftConfig {
                host: host.to_owned(),
                port,
                password: password.to_owned(),
            },
            ..Default::default()
        };
        RconClient::new(ConfigHandle::new(dir.path().join("config.json"), config))
    }

    #[tokio::test]
    async fn not_configured_without_host() {
        let dir = TempDir::new().unwrap();
        let client = client_for(&dir, "", 25575, PASSWORD);

        let result = client.execute("list").await;

        assert!(matches!(result, Err(RconError::NotConfigured)));
    }

    #[tokio::test]
    async fn not_configured_makes_no_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let port = listener.local_addr().unwrap().port();

        let dir = TempDir::new().unwrap();
        let client = client_for(&dir, "127.0.0.1", port, "");

        let result = client.execute("list").await;

        assert!(matches!(result, Err(RconError::NotConfigured)));
        assert_eq!(
            listener.accept().unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
    }

    #[tokio::test]
    async fn executes_command_and_closes_connection() {
        let (port, server) = spawn_server(Behaviour::Respond("Added Steve123 to the whitelist"));
        let dir = TempDir::new().unwrap();
        let client = client_for(&dir, "127.0.0.1", port, PASSWORD);

        let response = client.execute("whitelist add Steve123").await.unwrap();
        let report = server.join().unwrap();

        assert_eq!(response, "Added Steve123 to the whitelist");
        assert_eq!(report.commands, vec!["whitelist add Steve123".to_owned()]);
        assert!(report.client_closed);
    }

    #[tokio::test]
    async fn rejected_password_fails() {
        let (port, server) = spawn_server(Behaviour::RejectAuth);
        let dir = TempDir::new().unwrap();
        let client = client_for(&dir, "127.0.0.1", port, "wrong");

        let result = client.execute("list").await;
        let report = server.join().unwrap();

        assert!(matches!(result, Err(RconError::Authentication(_))));
        assert!(report.commands.is_empty());
        assert!(report.client_closed);
    }

    #[tokio::test]
    async fn server_hanging_up_fails() {
        let (port, server) = spawn_server(Behaviour::HangUpAfterAuth);
        let dir = TempDir::new().unwrap();
        let client = client_for(&dir, "127.0.0.1", port, PASSWORD);

        let result = client.execute("whitelist remove Steve123").await;
        let report = server.join().unwrap();

        assert!(result.is_err());
        assert_eq!(report.commands, vec!["whitelist remove Steve123".to_owned()]);
    }

    #[tokio::test]
    async fn hung_server_does_not_block_other_commands() {
        let (reached_tx, reached_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let (hung_port, hung_server) = spawn_server(Behaviour::Hang {
            reached: reached_tx,
            release: release_rx,
        });
        let dir = TempDir::new().unwrap();
        let client = Arc::new(client_for(&dir, "127.0.0.1", hung_port, PASSWORD));

        let stuck = tokio::spawn({
            let client = client.clone();
            async move { client.execute("whitelist add Steve123").await }
        });
        tokio::task::spawn_blocking(move || reached_rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();

        let (port, server) =
            spawn_server(Behaviour::Respond("There are 0 of a max of 20 players online"));
        client
            .config
            .set_server("127.0.0.1".to_owned(), port, PASSWORD.to_owned())
            .unwrap();

        let response = timeout(Duration::from_secs(5), client.execute("list"))
            .await
            .expect("command blocked behind the hung session")
            .unwrap();
        assert_eq!(response, "There are 0 of a max of 20 players online");
        assert_eq!(server.join().unwrap().commands, vec!["list".to_owned()]);

        release_tx.send(()).unwrap();
        assert!(stuck.await.unwrap().is_err());
        hung_server.join().unwrap();
    }

    #[tokio::test]
    async fn refused_connection_fails() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let dir = TempDir::new().unwrap();
        let client = client_for(&dir, "127.0.0.1", port, PASSWORD);

        let result = client.execute("list").await;

        assert!(matches!(result, Err(RconError::Connection { .. })));
    }
}
