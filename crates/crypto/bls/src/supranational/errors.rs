use blst::BLST_ERROR;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlstError {
    #[error("blst bad encoding")]
    BadEncoding,
    #[error("blst point not on curve")]
    PointNotOnCurve,
    #[error("blst point not in group")]
    PointNotInGroup,
    #[error("blst aggregate type mismatch")]
    AggrTypeMismatch,
    #[error("blst verification failed")]
    VerifyFail,
    #[error("blst public key is infinity")]
    PkIsInfinity,
    #[error("blst bad scalar")]
    BadScalar,
}

impl From<BLST_ERROR> for BlstError {
    fn from(value: BLST_ERROR) -> Self {
        match value {
            BLST_ERROR::BLST_SUCCESS => unreachable!("BLST_SUCCESS is not an error"),
            BLST_ERROR::BLST_BAD_ENCODING => BlstError::BadEncoding,
            BLST_ERROR::BLST_POINT_NOT_ON_CURVE => BlstError::PointNotOnCurve,
            BLST_ERROR::BLST_POINT_NOT_IN_GROUP => BlstError::PointNotInGroup,
            BLST_ERROR::BLST_AGGR_TYPE_MISMATCH => BlstError::AggrTypeMismatch,
            BLST_ERROR::BLST_VERIFY_FAIL => BlstError::VerifyFail,
            BLST_ERROR::BLST_PK_IS_INFINITY => BlstError::PkIsInfinity,
            BLST_ERROR::BLST_BAD_SCALAR => BlstError::BadScalar,
        }
    }
}
