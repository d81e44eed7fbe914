//! Thin facade over `broker-core` and `broker-protocol`, existing mainly to
//! host the black-box integration suites under `tests/integration/`: they
//! drive a real broker over a loopback socket the same way an external
//! client would, rather than calling internal APIs directly.

pub use broker_core::*;
pub use broker_protocol::*;

/// Spins up a broker on an ephemeral loopback port for integration tests.
pub mod test_support {
    use super::{Bind, Config, Core, Listener, TimezoneOffset};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::{TcpListener, TcpStream};

    pub struct TestServer {
        pub addr: SocketAddr,
        pub core: Arc<Core>,
    }

    pub async fn start(max_clients: usize) -> TestServer {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("bind ephemeral test port");
        let addr = listener.local_addr().expect("read local addr");

        let config = Arc::new(Config {
            bind: Bind::Tcp {
                host: addr.ip().to_string(),
                port: addr.port(),
            },
            read_size: 4096,
            max_clients,
            codec: broker_protocol::CodecKind::Json.build(),
            timezone: TimezoneOffset::UTC,
        });
        let core = Core::new(config);

        let serve_core = Arc::clone(&core);
        tokio::spawn(async move {
            Listener::Tcp(listener).serve(serve_core).await;
        });

        TestServer { addr, core }
    }

    pub async fn connect(server: &TestServer) -> TcpStream {
        TcpStream::connect(server.addr).await.expect("connect to test server")
    }
}
