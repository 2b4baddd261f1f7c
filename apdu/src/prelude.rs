// Copyright (c) 2022-2023 The Klaytn Authors

//! Prelude to simplify downstream use of APDU objects
//!

pub use crate::{
    address::{AddressReq, AddressResp},
    path::{Bip32Path, PathError},
    sign::{Protocol, RawSignature, SignFlags, SignReq, SignResp},
    status::StatusWord,
    tx::{FeeVariant, TxDescriptor, TxFamily, TxKind, DESCRIPTORS},
    version::{AppFlags, VersionReq, VersionResp},
    ApduError, ApduReq, Instruction, KLAY_APDU_CLA, MAX_APDU_DATA,
};
