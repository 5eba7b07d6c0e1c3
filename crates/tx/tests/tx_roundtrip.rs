//! Full-size serialize/deserialize round trip over a realistic op load.

use plexus_tx::{TxMsg, TxOp, TxOpFlags};
use plexus_types::tag::Uid;
use plexus_types::values::{Login, LoginResponse, TagValue};
use plexus_types::PinStatus;

#[test]
fn large_tx_roundtrips_byte_equal() {
    let mut tx = TxMsg::acquire();
    tx.header.status = PinStatus::Syncing;
    tx.set_context_id(Uid([0x1234_5678_90AB_CDEF, 0xABCD_EF12_3456_7890]));
    tx.envelope.set_from_id(Uid([11, 22]));

    let mut op = TxOp {
        flags: TxOpFlags::UPSERT,
        ..TxOp::default()
    };
    op.addr.node = Uid([3, 37]);
    op.addr.attr = Uid([0x06A2_5C10, 0x52D1_93F4]);
    op.addr.item = Uid([7383, 76549]);
    op.addr.edit = Uid([7337, 3773]);

    let login = Login {
        member: Some(TagValue::from_text("astar")),
        host_address: "batwing ave".to_string(),
    };
    tx.marshal_op(&mut op, Some(&login)).unwrap();

    // trailing scratch bytes in the data store must survive verbatim
    tx.data_store
        .extend_from_slice(b"bytes not used but stored -- not normal!");

    op.addr.node.0[0] += 37_733_773;
    op.addr.attr.0[1] = op.addr.attr.0[1].wrapping_sub(50_454_123);
    let mut data = b"hello-world".to_vec();
    for _ in 0..7 {
        let dup = data.clone();
        data.extend_from_slice(&dup);
    }
    tx.marshal_op(
        &mut op,
        Some(&Login {
            member: Some(TagValue::from_text("anonymous")),
            host_address: "http://localhost:8080".to_string(),
        }),
    )
    .unwrap();

    for i in 0..5500u64 {
        op.addr.item.0[0] = i;
        if i % 5 == 0 {
            op.addr.edit.0[1] += 37;
        }
        let mut hash = data.clone();
        hash.extend_from_slice(format!("-{i}").as_bytes());
        tx.marshal_op(&mut op, Some(&LoginResponse { hash_response: hash }))
            .unwrap();
    }

    // final op with a nil payload
    op.addr.item.0[0] = 111_111;
    op.addr.edit.0[1] = 55_445_544;
    op.flags = TxOpFlags::DELETE;
    tx.marshal_op_raw(&mut op, &[]);

    let mut bytes = Vec::new();
    tx.marshal_to_buffer(&mut bytes);

    let back = TxMsg::read_from(&mut bytes.as_slice()).unwrap();
    assert_eq!(back.envelope, tx.envelope);
    assert_eq!(back.header, tx.header);
    assert_eq!(back.ops.len(), tx.ops.len());
    assert_eq!(back.data_store, tx.data_store);
    for (a, b) in tx.ops.iter().zip(back.ops.iter()) {
        assert_eq!(a, b);
    }

    // the first op's value is recoverable by (attr, item)
    let mut out = Login::default();
    back.extract_value(Uid([0x06A2_5C10, 0x52D1_93F4]), Uid([7383, 76549]), &mut out)
        .unwrap();
    assert_eq!(out.host_address, "batwing ave");
}
