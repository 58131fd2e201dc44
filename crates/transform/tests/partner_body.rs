use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use transform::{Reshaper, SpecReshaper};
use test_utils::POLICY_SNAPSHOT;

fn credit_insurance_spec() -> Value {
    json!([
        {"operation": "shift", "spec": {
            "Debitor.[0].DebitorName": "insureds[2].detail.full_name",
            "Debitor.[0].DebitorIDNo": "insureds[2].detail.identity_type",
            "Debitor.[0].DebitorIDType": "insureds[2].detail.identity_number",
            "Debitor.[0].DebitorTglLahir": "insureds[2].detail.birth_date",
            "Debitor.[0].InceptionDate": "start_protection_at",
            "Debitor.[0].LamaPinjam": "insureds[0].detail.additional_info.fallback_tenure_next_date",
            "Debitor.[0].Pinjaman": "insureds[0].detail.loan_amount",
            "Debitor.[0].Catatan": "",
            "KreditorNama": "insureds[1].detail.full_name",
            "KreditorIDNo": "insureds[1].detail.identity_number",
            "KreditorIDType": "insureds[1].detail.identity_type",
            "NoRef": "policy_number"
        }},
        {"operation": "default", "spec": {"Debitor.[0].IDDebitor": "01", "SourceID": "20191030KOMUNAL"}},
        {"operation": "timestamp", "spec": {
            "Debitor.[0].DebitorTglLahir": {"inputFormat": "2006-01-02", "outputFormat": "01/02/2006"},
            "Debitor.[0].InceptionDate": {"inputFormat": "2006-01-02T15:04:05Z07:00", "outputFormat": "01/02/2006"}
        }},
        {"operation": "concat", "spec": {
            "sources": [{"path": "KreditorIDType"}, {"path": "KreditorIDNo"}],
            "targetPath": "KreditorIDNo",
            "delim": ":"
        }},
        {"operation": "concat", "spec": {
            "sources": [{"path": "Debitor.[0].DebitorIDNo"}, {"path": "Debitor.[0].DebitorIDType"}],
            "targetPath": "Debitor.[0].DebitorIDNo",
            "delim": ":"
        }},
        {"operation": "delete", "spec": {"paths": ["Debitor.[0].DebitorIDType", "KreditorIDType"]}}
    ])
}

#[test]
fn test_credit_insurance_body() {
    let out = SpecReshaper::new()
        .reshape(&credit_insurance_spec().to_string(), &POLICY_SNAPSHOT.to_string())
        .expect("reshape");
    let out: Value = serde_json::from_str(&out).unwrap();

    assert_eq!(
        out,
        json!({
            "Debitor": [{
                "Catatan": null,
                "DebitorName": "PT BAMBANG/BAMBANG",
                "DebitorIDNo": "KTP:3578263108880004",
                "DebitorTglLahir": "08/31/1979",
                "InceptionDate": "05/19/2022",
                "LamaPinjam": 91,
                "Pinjaman": 80000000,
                "IDDebitor": "01"
            }],
            "KreditorNama": "PT KOMUNAL FINANSIAL INDONESIA QQ PT BAMBANG MAJU BERSAMA",
            "KreditorIDNo": "KTP:3175044303960014",
            "NoRef": "KMNL-CRDT-20220519-FN8GA",
            "SourceID": "20191030KOMUNAL"
        })
    );
}

#[test]
fn test_same_spec_same_output() {
    let spec = credit_insurance_spec().to_string();
    let input = POLICY_SNAPSHOT.to_string();
    let reshaper = SpecReshaper::new();
    assert_eq!(
        reshaper.reshape(&spec, &input).unwrap(),
        reshaper.reshape(&spec, &input).unwrap()
    );
}
