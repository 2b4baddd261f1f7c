// Copyright (c) 2022-2023 The Klaytn Authors

//! Address APDUs, for fetching the public key and address of a derived account

use encdec::{Decode, DecodeOwned, Encode};

use super::{ApduError, ApduReq, Instruction};
use crate::path::Bip32Path;

/// P1 value requesting on-device address confirmation
pub const P1_CONFIRM: u8 = 0x01;

/// P1 value for silent address requests
pub const P1_NON_CONFIRM: u8 = 0x00;

/// Address request APDU.
///
/// Requests the public key and address for a BIP32 derived account.
/// P1 selects on-device display, P2 carries the account index.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  PATH_COUNT   |              PATH (u32 BE indices)            /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct AddressReq {
    /// Derivation path
    pub path: Bip32Path,
    /// Show and confirm address on device
    pub display: bool,
    /// Account index
    pub account_index: u8,
}

impl AddressReq {
    /// Create a new [AddressReq] APDU
    pub fn new(path: Bip32Path, display: bool, account_index: u8) -> Self {
        Self {
            path,
            display,
            account_index,
        }
    }
}

impl ApduReq for AddressReq {
    fn ins(&self) -> Instruction {
        Instruction::GetAddress
    }

    fn p1(&self) -> u8 {
        match self.display {
            true => P1_CONFIRM,
            false => P1_NON_CONFIRM,
        }
    }

    fn p2(&self) -> u8 {
        self.account_index
    }
}

impl Encode for AddressReq {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        self.path.encode_len()
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        self.path.encode(buff)
    }
}

/// Address response APDU
///
/// Contains the device public key and the ASCII hex address (without `0x`),
/// optionally followed by the BIP32 chain code.
///
/// ## Encoding:
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    PK_LEN     |                 PUBLIC_KEY ...                /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |   ADDR_LEN    |              ADDRESS (ASCII hex) ...          /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// /                    CHAIN_CODE (optional, 32 bytes)            /
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct AddressResp<'a> {
    /// Public key (SEC1 encoded)
    pub public_key: &'a [u8],
    /// Address as ASCII hex, without prefix
    pub address: &'a str,
    /// BIP32 chain code, when returned by the device
    pub chain_code: Option<[u8; 32]>,
}

impl<'a> AddressResp<'a> {
    /// Create a new [AddressResp] APDU
    pub fn new(public_key: &'a [u8], address: &'a str, chain_code: Option<[u8; 32]>) -> Self {
        Self {
            public_key,
            address,
            chain_code,
        }
    }
}

impl<'a> Encode for AddressResp<'a> {
    type Error = ApduError;

    fn encode_len(&self) -> Result<usize, Self::Error> {
        let mut len = 2 + self.public_key.len() + self.address.len();
        if self.chain_code.is_some() {
            len += 32;
        }
        Ok(len)
    }

    fn encode(&self, buff: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.encode_len()?;
        if buff.len() < n || self.public_key.len() > 255 || self.address.len() > 255 {
            return Err(ApduError::InvalidLength);
        }

        let mut index = 0;

        // Write public key
        buff[index] = self.public_key.len() as u8;
        buff[index + 1..][..self.public_key.len()].copy_from_slice(self.public_key);
        index += 1 + self.public_key.len();

        // Write address
        buff[index] = self.address.len() as u8;
        buff[index + 1..][..self.address.len()].copy_from_slice(self.address.as_bytes());
        index += 1 + self.address.len();

        // Write chain code
        if let Some(c) = &self.chain_code {
            buff[index..][..32].copy_from_slice(c);
            index += 32;
        }

        Ok(index)
    }
}

impl<'a> Decode<'a> for AddressResp<'a> {
    type Output = Self;
    type Error = ApduError;

    fn decode(buff: &'a [u8]) -> Result<(Self::Output, usize), Self::Error> {
        let mut index = 0;

        // Fetch public key
        let pk_len = *buff.first().ok_or(ApduError::InvalidLength)? as usize;
        index += 1;
        if buff.len() < index + pk_len + 1 {
            return Err(ApduError::InvalidLength);
        }
        let public_key = &buff[index..][..pk_len];
        index += pk_len;

        // Fetch address string
        let addr_len = buff[index] as usize;
        index += 1;
        if buff.len() < index + addr_len {
            return Err(ApduError::InvalidLength);
        }
        let address = &buff[index..][..addr_len];
        if !address.is_ascii() {
            return Err(ApduError::Utf8);
        }
        let address = core::str::from_utf8(address).map_err(|_| ApduError::Utf8)?;
        index += addr_len;

        // Fetch chain code if present
        let chain_code = match buff.len() - index {
            0 => None,
            n if n >= 32 => {
                let mut c = [0u8; 32];
                c.copy_from_slice(&buff[index..][..32]);
                index += 32;
                Some(c)
            }
            _ => return Err(ApduError::InvalidLength),
        };

        Ok((
            Self {
                public_key,
                address,
                chain_code,
            },
            index,
        ))
    }
}

impl DecodeOwned for AddressReq {
    type Output = Self;
    type Error = ApduError;

    /// Decode path only, P1/P2 are not part of the payload
    fn decode_owned(buff: &[u8]) -> Result<(Self::Output, usize), Self::Error> {
        let (path, n) = Bip32Path::decode_owned(buff)?;
        Ok((Self::new(path, false, 0), n))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::encode_decode_apdu;

    const KEY: &str = "0431553d8c312ef1668adcf75f179a59accb85ffad9ea2a8ecf91049d9cdafc4706f3eb10091a459826803d353b3e3a98af0e999cd44353879930d8baf0779fde7";

    #[test]
    fn address_req_apdu() {
        let apdu = AddressReq::new(Bip32Path::klaytn(0).unwrap(), false, 0);

        let mut buff = [0u8; 64];
        encode_decode_apdu(&mut buff, &apdu);
    }

    #[test]
    fn address_req_params() {
        let apdu = AddressReq::new(Bip32Path::klaytn(0).unwrap(), true, 3);

        let mut buff = [0u8; 64];
        let c = apdu.command(&mut buff).unwrap();

        assert_eq!((c.cla, c.ins, c.p1, c.p2), (0xe0, 0x02, 0x01, 0x03));
        assert_eq!(
            c.data,
            &hex::decode("058000002c80002019800000000000000000000000").unwrap()[..]
        );
    }

    #[test]
    fn address_resp_apdu() {
        let pk = hex::decode(KEY).unwrap();
        let apdu = AddressResp::new(&pk, "6E93a3ACfbaDF457F29fb0E57FA42274004c32EA", None);

        let mut buff = [0u8; 256];
        encode_decode_apdu(&mut buff, &apdu);
    }

    #[test]
    fn address_resp_chain_code() {
        let pk = hex::decode(KEY).unwrap();
        let apdu = AddressResp::new(
            &pk,
            "6E93a3ACfbaDF457F29fb0E57FA42274004c32EA",
            Some([0xab; 32]),
        );

        let mut buff = [0u8; 256];
        encode_decode_apdu(&mut buff, &apdu);
    }

    #[test]
    fn address_resp_device() {
        let r = hex::decode("410431553d8c312ef1668adcf75f179a59accb85ffad9ea2a8ecf91049d9cdafc4706f3eb10091a459826803d353b3e3a98af0e999cd44353879930d8baf0779fde72836453933613341436662614446343537463239666230453537464134323237343030346333324541").unwrap();

        let (a, n) = AddressResp::decode(&r).unwrap();

        assert_eq!(n, r.len());
        assert_eq!(a.public_key, &hex::decode(KEY).unwrap()[..]);
        assert_eq!(a.address, "6E93a3ACfbaDF457F29fb0E57FA42274004c32EA");
        assert_eq!(a.chain_code, None);
    }

    #[test]
    fn address_resp_truncated() {
        assert_eq!(AddressResp::decode(&[]), Err(ApduError::InvalidLength));
        assert_eq!(
            AddressResp::decode(&[0x02, 0xaa]),
            Err(ApduError::InvalidLength)
        );
        assert_eq!(
            AddressResp::decode(&[0x01, 0xaa, 0x04, b'a', b'b']),
            Err(ApduError::InvalidLength)
        );
    }
}
