// Copyright (c) 2022-2023 The Klaytn Authors

//! Transaction kinds and their signing descriptors
//!
//! Each supported transaction kind maps to a [TxDescriptor] describing the
//! instruction family used to sign it, the fee payment variant (selecting
//! P1/P2 flags) and whether the pre-image uses the typed envelope.

use num_enum::TryFromPrimitive;
use strum::{Display, EnumIter, EnumString, EnumVariantNames};

use crate::Instruction;

/// Klaytn transaction kinds, discriminants match on-chain type codes
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    Debug,
    Display,
    EnumString,
    EnumVariantNames,
    EnumIter,
    TryFromPrimitive,
)]
#[strum(serialize_all = "kebab-case")]
#[repr(u8)]
pub enum TxKind {
    Legacy = 0x00,
    ValueTransfer = 0x08,
    FeeDelegatedValueTransfer = 0x09,
    FeeDelegatedValueTransferWithRatio = 0x0a,
    ValueTransferMemo = 0x10,
    FeeDelegatedValueTransferMemo = 0x11,
    FeeDelegatedValueTransferMemoWithRatio = 0x12,
    SmartContractDeploy = 0x28,
    FeeDelegatedSmartContractDeploy = 0x29,
    FeeDelegatedSmartContractDeployWithRatio = 0x2a,
    SmartContractExecution = 0x30,
    FeeDelegatedSmartContractExecution = 0x31,
    FeeDelegatedSmartContractExecutionWithRatio = 0x32,
    Cancel = 0x38,
    FeeDelegatedCancel = 0x39,
    FeeDelegatedCancelWithRatio = 0x3a,
}

/// Transaction families, sharing a signing instruction
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display)]
pub enum TxFamily {
    Legacy,
    ValueTransfer,
    ValueTransferMemo,
    SmartContractDeploy,
    SmartContractExecution,
    Cancel,
}

impl TxFamily {
    /// Signing instruction for this family
    pub const fn instruction(&self) -> Instruction {
        match self {
            TxFamily::Legacy => Instruction::SignLegacy,
            TxFamily::ValueTransfer => Instruction::SignValueTransfer,
            TxFamily::ValueTransferMemo => Instruction::SignValueTransferMemo,
            TxFamily::SmartContractDeploy => Instruction::SignSmartContractDeploy,
            TxFamily::SmartContractExecution => Instruction::SignSmartContractExecution,
            TxFamily::Cancel => Instruction::SignCancel,
        }
    }
}

/// Fee payment variant
#[derive(Copy, Clone, PartialEq, Eq, Debug, Display, TryFromPrimitive)]
#[repr(u8)]
pub enum FeeVariant {
    /// Sender pays the fee
    Basic = 0,
    /// Fee payer covers the full fee
    FeeDelegated = 1,
    /// Fee payer covers a percentage of the fee
    FeeDelegatedWithRatio = 2,
}

/// Static signing descriptor for a [TxKind]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct TxDescriptor {
    /// Transaction kind
    pub kind: TxKind,
    /// Instruction family
    pub family: TxFamily,
    /// Fee payment variant
    pub fee: FeeVariant,
    /// Pre-image uses the typed envelope (chain id as the second item)
    pub typed: bool,
    /// Type name as used by the Klaytn SDKs
    pub type_name: &'static str,
}

const fn desc(
    kind: TxKind,
    family: TxFamily,
    fee: FeeVariant,
    type_name: &'static str,
) -> TxDescriptor {
    TxDescriptor {
        kind,
        family,
        fee,
        typed: !matches!(family, TxFamily::Legacy),
        type_name,
    }
}

use FeeVariant::*;

/// Descriptor table, indexed by [TxKind::index]
pub static DESCRIPTORS: [TxDescriptor; 16] = [
    desc(TxKind::Legacy, TxFamily::Legacy, Basic, "TxTypeLegacyTransaction"),
    desc(TxKind::ValueTransfer, TxFamily::ValueTransfer, Basic, "TxTypeValueTransfer"),
    desc(
        TxKind::FeeDelegatedValueTransfer,
        TxFamily::ValueTransfer,
        FeeDelegated,
        "TxTypeFeeDelegatedValueTransfer",
    ),
    desc(
        TxKind::FeeDelegatedValueTransferWithRatio,
        TxFamily::ValueTransfer,
        FeeDelegatedWithRatio,
        "TxTypeFeeDelegatedValueTransferWithRatio",
    ),
    desc(
        TxKind::ValueTransferMemo,
        TxFamily::ValueTransferMemo,
        Basic,
        "TxTypeValueTransferMemo",
    ),
    desc(
        TxKind::FeeDelegatedValueTransferMemo,
        TxFamily::ValueTransferMemo,
        FeeDelegated,
        "TxTypeFeeDelegatedValueTransferMemo",
    ),
    desc(
        TxKind::FeeDelegatedValueTransferMemoWithRatio,
        TxFamily::ValueTransferMemo,
        FeeDelegatedWithRatio,
        "TxTypeFeeDelegatedValueTransferMemoWithRatio",
    ),
    desc(
        TxKind::SmartContractDeploy,
        TxFamily::SmartContractDeploy,
        Basic,
        "TxTypeSmartContractDeploy",
    ),
    desc(
        TxKind::FeeDelegatedSmartContractDeploy,
        TxFamily::SmartContractDeploy,
        FeeDelegated,
        "TxTypeFeeDelegatedSmartContractDeploy",
    ),
    desc(
        TxKind::FeeDelegatedSmartContractDeployWithRatio,
        TxFamily::SmartContractDeploy,
        FeeDelegatedWithRatio,
        "TxTypeFeeDelegatedSmartContractDeployWithRatio",
    ),
    desc(
        TxKind::SmartContractExecution,
        TxFamily::SmartContractExecution,
        Basic,
        "TxTypeSmartContractExecution",
    ),
    desc(
        TxKind::FeeDelegatedSmartContractExecution,
        TxFamily::SmartContractExecution,
        FeeDelegated,
        "TxTypeFeeDelegatedSmartContractExecution",
    ),
    desc(
        TxKind::FeeDelegatedSmartContractExecutionWithRatio,
        TxFamily::SmartContractExecution,
        FeeDelegatedWithRatio,
        "TxTypeFeeDelegatedSmartContractExecutionWithRatio",
    ),
    desc(TxKind::Cancel, TxFamily::Cancel, Basic, "TxTypeCancel"),
    desc(
        TxKind::FeeDelegatedCancel,
        TxFamily::Cancel,
        FeeDelegated,
        "TxTypeFeeDelegatedCancel",
    ),
    desc(
        TxKind::FeeDelegatedCancelWithRatio,
        TxFamily::Cancel,
        FeeDelegatedWithRatio,
        "TxTypeFeeDelegatedCancelWithRatio",
    ),
];

impl TxKind {
    /// Position of this kind in [DESCRIPTORS]
    ///
    /// Type codes group families on 8-byte boundaries with the fee variant
    /// in the low bits.
    pub const fn index(&self) -> usize {
        let code = *self as u8;
        let family = match code & 0xf8 {
            0x08 => 0,
            0x10 => 1,
            0x28 => 2,
            0x30 => 3,
            0x38 => 4,
            _ => return 0,
        };
        1 + family * 3 + (code & 0x07) as usize
    }

    /// Fetch the static descriptor for this kind
    pub fn descriptor(&self) -> &'static TxDescriptor {
        &DESCRIPTORS[self.index()]
    }

    /// Instruction family for this kind
    pub fn family(&self) -> TxFamily {
        self.descriptor().family
    }

    /// Fee payment variant for this kind
    pub fn fee(&self) -> FeeVariant {
        self.descriptor().fee
    }

    /// Whether the pre-image uses the typed envelope
    pub fn is_typed(&self) -> bool {
        self.descriptor().typed
    }

    /// Signing instruction for this kind
    pub fn instruction(&self) -> Instruction {
        self.family().instruction()
    }

    /// Look up a kind by SDK type name (eg. `TxTypeFeeDelegatedCancel`)
    pub fn from_type_name(name: &str) -> Option<Self> {
        DESCRIPTORS
            .iter()
            .find(|d| d.type_name == name)
            .map(|d| d.kind)
    }
}
