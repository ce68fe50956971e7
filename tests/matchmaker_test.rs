//! End-to-end tests: real listener, real TCP clients.

use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use strictly_duel::{
    Board, Cell, Mark, Matchmaker, Message, MessageCodec, MoveError, Outcome, ServerConfig,
    SessionPhase, Slot,
};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

type Client = Framed<TcpStream, MessageCodec>;

const TIMEOUT: Duration = Duration::from_secs(2);

async fn start_server() -> (Arc<Matchmaker>, SocketAddr, JoinHandle<()>) {
    let matchmaker = Arc::new(Matchmaker::new(ServerConfig::default()));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handle = tokio::spawn(matchmaker.clone().serve(listener));
    (matchmaker, addr, handle)
}

async fn connect(addr: SocketAddr) -> Client {
    let stream = TcpStream::connect(addr).await.expect("connect");
    Framed::new(stream, MessageCodec::default())
}

async fn recv(client: &mut Client) -> Message {
    tokio::time::timeout(TIMEOUT, client.next())
        .await
        .expect("timed out waiting for message")
        .expect("stream ended")
        .expect("frame error")
        .expect("undecodable message")
}

async fn assert_silent(client: &mut Client) {
    let next = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(next.is_err(), "unexpected message: {:?}", next);
}

async fn play(client: &mut Client, row: u8, col: u8, mark: Mark) {
    client
        .send(Message::PlayerMove { row, col, mark })
        .await
        .expect("send move");
}

/// Polls `check` until it holds or the timeout passes.
async fn eventually(check: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never held");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Connects X then O and consumes the pairing notices.
async fn paired(addr: SocketAddr) -> (Client, Client) {
    let mut x = connect(addr).await;
    assert_eq!(recv(&mut x).await, Message::waiting());

    let mut o = connect(addr).await;
    let start = Message::GameStart {
        board: Board::new(),
    };
    assert_eq!(recv(&mut x).await, Message::player_connected(Mark::X));
    assert_eq!(recv(&mut x).await, start);
    assert_eq!(recv(&mut x).await, Message::your_turn());
    assert_eq!(recv(&mut o).await, Message::player_connected(Mark::O));
    assert_eq!(recv(&mut o).await, start);
    assert_eq!(recv(&mut o).await, Message::opponent_turn());
    (x, o)
}

#[tokio::test]
async fn test_full_game_top_row_win() {
    let (matchmaker, addr, _server) = start_server().await;
    let (mut x, mut o) = paired(addr).await;

    let moves = [
        (0, 0, Mark::X),
        (1, 0, Mark::O),
        (0, 1, Mark::X),
        (1, 1, Mark::O),
    ];
    for (row, col, mark) in moves {
        let (mover, waiter) = match mark {
            Mark::X => (&mut x, &mut o),
            Mark::O => (&mut o, &mut x),
        };
        play(mover, row, col, mark).await;
        assert!(matches!(recv(mover).await, Message::GameUpdate { .. }));
        assert_eq!(recv(mover).await, Message::opponent_turn());
        assert!(matches!(recv(waiter).await, Message::GameUpdate { .. }));
        assert_eq!(recv(waiter).await, Message::your_turn());
    }

    play(&mut x, 0, 2, Mark::X).await;
    for client in [&mut x, &mut o] {
        match recv(client).await {
            Message::GameUpdate { board, row, col, mark } => {
                assert_eq!((row, col, mark), (0, 2, Mark::X));
                assert_eq!(board.rows()[0], [Cell::Occupied(Mark::X); 3]);
            }
            other => panic!("expected update, got {:?}", other),
        }
        assert_eq!(recv(client).await, Message::game_over(Outcome::Win(Mark::X)));
    }

    let session = matchmaker.sessions()[0].clone();
    assert_eq!(session.phase(), SessionPhase::Finished);
}

#[tokio::test]
async fn test_out_of_turn_move_only_answers_sender() {
    let (matchmaker, addr, _server) = start_server().await;
    let (mut x, mut o) = paired(addr).await;

    play(&mut o, 1, 1, Mark::O).await;

    assert_eq!(
        recv(&mut o).await,
        Message::invalid_move(MoveError::WrongTurn(Mark::O))
    );
    assert_silent(&mut x).await;
    assert_eq!(matchmaker.sessions()[0].snapshot(), Board::new());
}

#[tokio::test]
async fn test_disconnect_ends_match_and_survivor_is_repaired() {
    let (matchmaker, addr, _server) = start_server().await;
    let (mut x, mut o) = paired(addr).await;
    play(&mut x, 1, 1, Mark::X).await;
    recv(&mut x).await;
    recv(&mut o).await;
    recv(&mut o).await;

    drop(x);

    assert_eq!(recv(&mut o).await, Message::peer_disconnected());
    assert_eq!(recv(&mut o).await, Message::waiting());
    let session = matchmaker.sessions()[0].clone();
    assert_eq!(session.phase(), SessionPhase::AwaitingPlayers);
    assert_eq!(session.occupant(Slot::A), None);
    assert!(session.occupant(Slot::B).is_some());
    // Stale board stays until a new opponent arrives
    assert_eq!(session.snapshot().get(1, 1), Some(Cell::Occupied(Mark::X)));

    let mut fresh = connect(addr).await;
    assert_eq!(recv(&mut fresh).await, Message::player_connected(Mark::X));
    let start = Message::GameStart {
        board: Board::new(),
    };
    assert_eq!(recv(&mut fresh).await, start);
    assert_eq!(recv(&mut fresh).await, Message::your_turn());
    assert_eq!(recv(&mut o).await, Message::player_connected(Mark::O));
    assert_eq!(recv(&mut o).await, start);
    assert_eq!(recv(&mut o).await, Message::opponent_turn());
    assert_eq!(session.phase(), SessionPhase::InProgress);
}

#[tokio::test]
async fn test_survivor_is_paired_with_waiting_participant() {
    let (matchmaker, addr, _server) = start_server().await;
    let (a, mut b) = paired(addr).await;
    let mut c = connect(addr).await;
    assert_eq!(recv(&mut c).await, Message::waiting());
    assert_eq!(matchmaker.sessions().len(), 2);

    drop(a);

    let start = Message::GameStart {
        board: Board::new(),
    };
    assert_eq!(recv(&mut b).await, Message::peer_disconnected());
    assert_eq!(recv(&mut b).await, Message::waiting());
    assert_eq!(recv(&mut b).await, Message::player_connected(Mark::O));
    assert_eq!(recv(&mut b).await, start);
    assert_eq!(recv(&mut b).await, Message::opponent_turn());
    assert_eq!(recv(&mut c).await, Message::player_connected(Mark::X));
    assert_eq!(recv(&mut c).await, start);
    assert_eq!(recv(&mut c).await, Message::your_turn());

    let sessions = matchmaker.sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].phase(), SessionPhase::InProgress);

    // The moved participant plays in its new session
    play(&mut c, 0, 0, Mark::X).await;
    assert!(matches!(recv(&mut c).await, Message::GameUpdate { row: 0, col: 0, .. }));
    assert!(matches!(recv(&mut b).await, Message::GameUpdate { row: 0, col: 0, .. }));
}

#[tokio::test]
async fn test_lone_participant_leaving_frees_the_slot() {
    let (matchmaker, addr, _server) = start_server().await;
    let mut first = connect(addr).await;
    assert_eq!(recv(&mut first).await, Message::waiting());

    drop(first);
    eventually(|| matchmaker.sessions().iter().all(|s| s.is_vacant())).await;

    let mut second = connect(addr).await;
    assert_eq!(recv(&mut second).await, Message::waiting());
    assert_silent(&mut second).await;
}

#[tokio::test]
async fn test_second_pair_gets_its_own_session() {
    let (matchmaker, addr, _server) = start_server().await;
    let (_x1, _o1) = paired(addr).await;
    let (_x2, _o2) = paired(addr).await;

    let sessions = matchmaker.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.phase() == SessionPhase::InProgress));
}

#[tokio::test]
async fn test_malformed_frame_is_ignored() {
    let (_matchmaker, addr, _server) = start_server().await;
    let (mut x, mut o) = paired(addr).await;

    let garbage = b"{\"type\":\"teleport\"}";
    let stream = x.get_mut();
    stream
        .write_all(&(garbage.len() as u32).to_be_bytes())
        .await
        .expect("write length");
    stream.write_all(garbage).await.expect("write payload");

    play(&mut x, 2, 2, Mark::X).await;
    assert!(matches!(recv(&mut x).await, Message::GameUpdate { row: 2, col: 2, .. }));
    assert!(matches!(recv(&mut o).await, Message::GameUpdate { row: 2, col: 2, .. }));
}

#[tokio::test]
async fn test_shutdown_closes_every_participant() {
    let (matchmaker, addr, server) = start_server().await;
    let (mut x, mut o) = paired(addr).await;

    matchmaker.shutdown();
    tokio::time::timeout(TIMEOUT, server)
        .await
        .expect("serve did not stop")
        .expect("serve panicked");

    for client in [&mut x, &mut o] {
        let next = tokio::time::timeout(TIMEOUT, client.next())
            .await
            .expect("connection not closed");
        assert!(next.is_none() || matches!(next, Some(Err(_))));
    }
    assert!(matchmaker.sessions().is_empty());
}
