use super::*;
use axum::{extract::State, routing::post, Json, Router};
use dapp_core::{DappController, DappEvent, RenderState};
use tokio::{net::TcpListener, sync::Mutex};

fn word_hex(value: u64) -> String {
    let mut word = [0u8; abi::WORD_LEN];
    word[24..].copy_from_slice(&value.to_be_bytes());
    format!("0x{}", hex::encode(word))
}

fn selector_prefix(signature: &str) -> String {
    format!("0x{}", hex::encode(abi::selector(signature)))
}

#[derive(Clone)]
struct StubNode {
    chain_id: u64,
    accounts: Vec<String>,
    count: u64,
    whitelisted: bool,
    tx_hash: String,
    revert: bool,
    receipt_polls_until_ready: Arc<Mutex<u32>>,
    eth_call_data: Arc<Mutex<Vec<String>>>,
}

impl StubNode {
    fn sepolia() -> Self {
        Self {
            chain_id: 11_155_111,
            accounts: vec!["0xab5801a7d398351b8be11c439e05c5b3259aec9b".into()],
            count: 5,
            whitelisted: false,
            tx_hash: "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"
                .into(),
            revert: false,
            receipt_polls_until_ready: Arc::new(Mutex::new(0)),
            eth_call_data: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

async fn handle_rpc(State(node): State<StubNode>, Json(request): Json<Value>) -> Json<Value> {
    let method = request["method"].as_str().unwrap_or_default();
    let result = match method {
        "eth_accounts" => json!(node.accounts),
        "eth_chainId" => json!(format!("0x{:x}", node.chain_id)),
        "eth_call" => {
            let data = request["params"][0]["data"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            node.eth_call_data.lock().await.push(data.clone());
            if data.starts_with(&selector_prefix(NUM_ADDRESSES_WHITELISTED_SIG)) {
                json!(word_hex(node.count))
            } else if data.starts_with(&selector_prefix(WHITELISTED_ADDRESSES_SIG)) {
                json!(word_hex(node.whitelisted as u64))
            } else {
                json!(null)
            }
        }
        "eth_sendTransaction" => json!(node.tx_hash),
        "eth_getTransactionReceipt" => {
            let mut remaining = node.receipt_polls_until_ready.lock().await;
            if *remaining > 0 {
                *remaining -= 1;
                json!(null)
            } else {
                json!({ "status": if node.revert { "0x0" } else { "0x1" } })
            }
        }
        _ => json!(null),
    };
    Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
}

async fn spawn_stub_node(node: StubNode) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    let app = Router::new().route("/", post(handle_rpc)).with_state(node);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn contract_address() -> Address {
    "0xd9145cce52d386f254917e481eb44e9943f39138"
        .parse()
        .expect("contract address")
}

#[tokio::test]
async fn wallet_session_reads_chain_id_and_address() {
    let url = spawn_stub_node(StubNode::sepolia()).await;
    let provider = RpcWalletProvider::new(RpcClient::new(url));

    let session = provider.connect().await.expect("connect");
    assert_eq!(session.chain_id().await.expect("chain id"), ChainId::SEPOLIA);

    let signer = session.signer().await.expect("signer");
    assert_eq!(
        signer.address().await.expect("address").to_string(),
        "0xab5801a7d398351b8be11c439e05c5b3259aec9b"
    );
}

#[tokio::test]
async fn connect_fails_when_wallet_has_no_accounts() {
    let mut node = StubNode::sepolia();
    node.accounts.clear();
    let url = spawn_stub_node(node).await;
    let provider = RpcWalletProvider::new(RpcClient::new(url));

    let err = provider.connect().await.expect_err("no accounts");
    assert!(err.to_string().contains("no accounts"));
}

#[tokio::test]
async fn whitelist_reads_decode_count_and_membership() {
    let mut node = StubNode::sepolia();
    node.count = 42;
    node.whitelisted = true;
    let calls = Arc::clone(&node.eth_call_data);
    let url = spawn_stub_node(node).await;
    let contract = RpcWhitelistContract::new(RpcClient::new(url), contract_address());

    assert_eq!(
        contract.num_addresses_whitelisted().await.expect("count"),
        42
    );

    let caller: Address = "0xab5801a7d398351b8be11c439e05c5b3259aec9b"
        .parse()
        .expect("caller");
    assert!(contract.is_whitelisted(caller).await.expect("membership"));

    let seen = calls.lock().await;
    assert_eq!(seen.len(), 2);
    // The membership call carries the caller address as one left-padded word.
    assert!(seen[1].ends_with("ab5801a7d398351b8be11c439e05c5b3259aec9b"));
    assert_eq!(seen[1].len(), 2 + 8 + abi::WORD_LEN * 2);
}

#[tokio::test]
async fn join_submits_transaction_and_polls_for_receipt() {
    let node = StubNode::sepolia();
    *node.receipt_polls_until_ready.lock().await = 2;
    let url = spawn_stub_node(node.clone()).await;
    let rpc = RpcClient::new(url);
    let contract = RpcWhitelistContract::new(Arc::clone(&rpc), contract_address())
        .with_receipt_poll_interval(Duration::from_millis(10));

    let signer: Arc<dyn SigningHandle> = Arc::new(RpcSigningHandle {
        address: "0xab5801a7d398351b8be11c439e05c5b3259aec9b"
            .parse()
            .expect("signer address"),
    });
    let tx = contract
        .add_address_to_whitelist(signer)
        .await
        .expect("submit");
    assert_eq!(tx.hash().to_string(), node.tx_hash);
    tx.wait().await.expect("confirmation after polls");
}

#[tokio::test]
async fn reverted_transaction_fails_wait() {
    let mut node = StubNode::sepolia();
    node.revert = true;
    let url = spawn_stub_node(node).await;
    let rpc = RpcClient::new(url);
    let contract = RpcWhitelistContract::new(Arc::clone(&rpc), contract_address())
        .with_receipt_poll_interval(Duration::from_millis(10));

    let signer: Arc<dyn SigningHandle> = Arc::new(RpcSigningHandle {
        address: "0xab5801a7d398351b8be11c439e05c5b3259aec9b"
            .parse()
            .expect("signer address"),
    });
    let tx = contract
        .add_address_to_whitelist(signer)
        .await
        .expect("submit");
    let err = tx.wait().await.expect_err("revert");
    assert!(err.to_string().contains("reverted"));
}

#[tokio::test]
async fn controller_connects_and_joins_over_rpc() {
    let url = spawn_stub_node(StubNode::sepolia()).await;
    let rpc = RpcClient::new(url);
    let controller = DappController::new_with_dependencies(
        Arc::new(RpcWalletProvider::new(Arc::clone(&rpc))),
        Arc::new(
            RpcWhitelistContract::new(Arc::clone(&rpc), contract_address())
                .with_receipt_poll_interval(Duration::from_millis(10)),
        ),
        ChainId::SEPOLIA,
    );

    let mut events = controller.subscribe_events();
    controller.connect().await.expect("connect");

    // Wait for both connect-time background refreshes to land.
    let mut saw_count = false;
    let mut saw_status = false;
    while !(saw_count && saw_status) {
        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("refresh event timeout")
            .expect("events channel closed");
        match event {
            DappEvent::WhitelistCountUpdated(_) => saw_count = true,
            DappEvent::WhitelistStatusUpdated(_) => saw_status = true,
            _ => {}
        }
    }

    let view = controller.view_model().await;
    assert_eq!(view.render_state, RenderState::PromptJoin);
    assert_eq!(view.whitelist_count, 5);

    controller.join_whitelist().await.expect("join");
    let view = controller.view_model().await;
    assert_eq!(view.render_state, RenderState::AlreadyJoined);
}
