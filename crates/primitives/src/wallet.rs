//! A `Wallet` is a wrapper around an ethers wallet that signs user operation hashes
use crate::{error::WalletError, UserOperationHash};
use ethers::{
    prelude::k256::ecdsa::SigningKey,
    signers::{coins_bip39::English, LocalWallet, MnemonicBuilder, Signer},
    types::{Address, Bytes},
};
use expanded_pathbuf::ExpandedPathBuf;

const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// Wrapper around ethers wallet
#[derive(Clone, Debug)]
pub struct Wallet {
    /// Signing key of the wallet (owner of the smart account)
    pub signer: ethers::signers::Wallet<SigningKey>,
}

impl Wallet {
    /// Create a new wallet from the given file containing the mnemonic phrase
    ///
    /// # Arguments
    /// * `path` - The path to the file where the mnemonic phrase is stored
    /// * `chain_id` - The chain id of the blockchain network to be used
    ///
    /// # Returns
    /// * `Self` - A new `Wallet` instance
    pub fn from_file(path: ExpandedPathBuf, chain_id: u64) -> Result<Self, WalletError> {
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(path.to_path_buf())
            .derivation_path(DERIVATION_PATH)
            .map_err(|e| WalletError::Mnemonic { inner: e.to_string() })?
            .build()
            .map_err(|e| WalletError::Mnemonic { inner: e.to_string() })?;

        Ok(Self { signer: wallet.with_chain_id(chain_id) })
    }

    /// Create a new wallet from the given mnemonic phrase
    ///
    /// # Arguments
    /// * `phrase` - The mnemonic phrase
    /// * `chain_id` - The chain id of the blockchain network to be used
    ///
    /// # Returns
    /// * `Self` - A new `Wallet` instance
    pub fn from_phrase(phrase: &str, chain_id: u64) -> Result<Self, WalletError> {
        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .derivation_path(DERIVATION_PATH)
            .map_err(|e| WalletError::Mnemonic { inner: e.to_string() })?
            .build()
            .map_err(|e| WalletError::Mnemonic { inner: e.to_string() })?;

        Ok(Self { signer: wallet.with_chain_id(chain_id) })
    }

    /// Create a new wallet from a hex-encoded private key
    pub fn from_private_key(key: &str, chain_id: u64) -> Result<Self, WalletError> {
        let wallet = key
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| WalletError::PrivateKey { inner: e.to_string() })?;

        Ok(Self { signer: wallet.with_chain_id(chain_id) })
    }

    /// Address of the signing key
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Signs the user operation hash as an EIP-191 personal message, the scheme SimpleAccount
    /// verifies against its owner
    pub async fn sign_user_operation_hash(
        &self,
        hash: &UserOperationHash,
    ) -> Result<Bytes, WalletError> {
        let sig = self
            .signer
            .sign_message(hash.as_bytes())
            .await
            .map_err(|e| WalletError::Signing { inner: e.to_string() })?;
        Ok(sig.to_vec().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Signature;

    const PHRASE: &str = "test test test test test test test test test test test junk";

    #[tokio::test]
    async fn signs_recoverable_hash() {
        let wallet = Wallet::from_phrase(PHRASE, 1).unwrap();
        assert_eq!(
            wallet.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );

        let hash = UserOperationHash::from([7u8; 32]);
        let sig = wallet.sign_user_operation_hash(&hash).await.unwrap();
        assert_eq!(sig.len(), 65);

        let signature = Signature::try_from(sig.as_ref()).unwrap();
        assert_eq!(signature.recover(hash.as_bytes()).unwrap(), wallet.address());
    }

    #[test]
    fn private_key_wallet() {
        let wallet = Wallet::from_private_key(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            1,
        )
        .unwrap();
        assert_eq!(
            wallet.address(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
        assert!(Wallet::from_private_key("0x1234", 1).is_err());
    }
}
