//! End-to-end server actor behavior driven through the public evaluator:
//! FIFO message ordering and state isolation between independently declared
//! servers.

use relay_runtime::actor::router::{Router, ServerRegistry};
use relay_runtime::ast::{
    Accessor, BinOp, BinaryExpr, Block, Expr, Literal, PrimaryExpr, ReceiveDef, ReturnExpr, SendExpr, ServerDefExpr,
    SetExpr, StateFieldDecl,
};
use relay_runtime::interpreter::Evaluator;

fn state_get(key: &str) -> Expr {
    Expr::Primary(PrimaryExpr {
        base: Box::new(Expr::Identifier("state".to_string())),
        chain: vec![Accessor::MethodCall {
            name: "get".to_string(),
            args: vec![Expr::Literal(Literal::String(key.to_string()))],
        }],
    })
}

fn state_set(key: &str, value: Expr) -> Expr {
    Expr::Primary(PrimaryExpr {
        base: Box::new(Expr::Identifier("state".to_string())),
        chain: vec![Accessor::MethodCall {
            name: "set".to_string(),
            args: vec![Expr::Literal(Literal::String(key.to_string())), value],
        }],
    })
}

/// Builds a `CounterServer` definition whose sole receive method reads
/// `count` out of state, increments it, writes it back, and returns the
/// new value.
fn counter_server_def(name: &str) -> ServerDefExpr {
    let body = Block::new(vec![
        Expr::Set(SetExpr {
            variable: "next".to_string(),
            value: Box::new(Expr::Binary(BinaryExpr {
                left: Box::new(state_get("count")),
                rest: vec![(BinOp::Add, Expr::Literal(Literal::Number(1.0)))],
            })),
        }),
        state_set("count", Expr::Identifier("next".to_string())),
        Expr::Return(ReturnExpr {
            value: Some(Box::new(Expr::Identifier("next".to_string()))),
        }),
    ]);

    ServerDefExpr {
        name: name.to_string(),
        state: vec![StateFieldDecl {
            name: "count".to_string(),
            type_name: Some("number".to_string()),
            default: Some(Expr::Literal(Literal::Number(0.0))),
        }],
        receives: vec![ReceiveDef {
            name: "increment".to_string(),
            params: vec![],
            return_type: Some("number".to_string()),
            body,
        }],
    }
}

fn send_increment(target: &str) -> Expr {
    Expr::Send(SendExpr {
        target: target.to_string(),
        method: "increment".to_string(),
        args: None,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sequential_sends_observe_strict_fifo_ordering() {
    let router = Router::new(ServerRegistry::new()).start();
    let evaluator = Evaluator::new(router);
    let env = evaluator.global_env.clone();

    evaluator
        .eval(&Expr::ServerDef(counter_server_def("Tally")), &env)
        .expect("server definition should succeed");

    let first = evaluator.eval(&send_increment("Tally"), &env).unwrap();
    let second = evaluator.eval(&send_increment("Tally"), &env).unwrap();
    let third = evaluator.eval(&send_increment("Tally"), &env).unwrap();

    assert_eq!(first.as_number(), Some(1.0));
    assert_eq!(second.as_number(), Some(2.0));
    assert_eq!(third.as_number(), Some(3.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_servers_keep_independent_state() {
    let router = Router::new(ServerRegistry::new()).start();
    let evaluator = Evaluator::new(router);
    let env = evaluator.global_env.clone();

    evaluator.eval(&Expr::ServerDef(counter_server_def("A")), &env).unwrap();
    evaluator.eval(&Expr::ServerDef(counter_server_def("B")), &env).unwrap();

    evaluator.eval(&send_increment("A"), &env).unwrap();
    evaluator.eval(&send_increment("A"), &env).unwrap();
    let a_third = evaluator.eval(&send_increment("A"), &env).unwrap();
    let b_first = evaluator.eval(&send_increment("B"), &env).unwrap();

    assert_eq!(a_third.as_number(), Some(3.0));
    assert_eq!(b_first.as_number(), Some(1.0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sending_to_an_undeclared_server_is_an_error() {
    let router = Router::new(ServerRegistry::new()).start();
    let evaluator = Evaluator::new(router);
    let env = evaluator.global_env.clone();

    let err = evaluator.eval(&send_increment("Ghost"), &env).unwrap_err();
    assert!(matches!(err, relay_runtime::error::RelayError::ServerNotFound(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn redeclaring_a_server_under_the_same_name_resets_its_state() {
    let router = Router::new(ServerRegistry::new()).start();
    let evaluator = Evaluator::new(router);
    let env = evaluator.global_env.clone();

    evaluator.eval(&Expr::ServerDef(counter_server_def("Reloadable")), &env).unwrap();
    evaluator.eval(&send_increment("Reloadable"), &env).unwrap();
    evaluator.eval(&send_increment("Reloadable"), &env).unwrap();

    // Redeclaring replaces the running actor, so state starts fresh again.
    evaluator.eval(&Expr::ServerDef(counter_server_def("Reloadable")), &env).unwrap();
    let after_reload = evaluator.eval(&send_increment("Reloadable"), &env).unwrap();
    assert_eq!(after_reload.as_number(), Some(1.0));
}

