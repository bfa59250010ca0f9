// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Solidity bindings for the identity registry, loan contract and
//! settlement token.

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IIdentityRegistry {
        function registeredUsers(address user) external view returns (bool);

        function checkHash(
            uint256[] inputs,
            uint256 _aggregationId,
            uint256 _domainId,
            bytes32[] _merklePath,
            uint256 _leafCount,
            uint256 _index
        ) external;
    }
}

sol! {
    #[sol(rpc)]
    interface ISalaryLoan {
        struct LoanDetails {
            uint256 loanId;
            address borrower;
            uint256 amount;
            uint256 interestRate;
            uint256 termMonths;
            uint256 monthlyPayment;
            uint256 totalAmount;
            uint256 remainingBalance;
            uint256 startTime;
            uint256 lastPaymentTime;
            bool isActive;
            bool isPaidOff;
            string salaryRange;
            bytes32 documentCommitment;
        }

        event LoanApplied(
            uint256 indexed loanId,
            address indexed borrower,
            uint256 amount,
            string salaryRange,
            uint256 interestRate
        );

        event SalaryDocumentVerified(
            bytes32 indexed documentCommitment,
            string salaryRange,
            address indexed borrower
        );

        function verifySalaryProof(bytes calldata _publicValues, bytes calldata _proofBytes)
            external
            returns (string memory, bool, bytes32, bytes32);

        function applyForLoan(uint256 amount, uint256 termMonths, bytes32 documentCommitment)
            external
            returns (uint256);

        function getLoanDetails(uint256 loanId) external view returns (LoanDetails memory);
        function getUserLoans(address user) external view returns (uint256[] memory);
        function verifiedDocuments(bytes32 documentCommitment) external view returns (bool);
        function salaryRangeLimits(string calldata salaryRange) external view returns (uint256);
        function salaryRangeInterestRates(string calldata salaryRange) external view returns (uint256);

        function getContractStats()
            external
            view
            returns (
                uint256 totalLoansIssued,
                uint256 totalActiveLoans,
                uint256 contractBalance,
                uint256 nextLoanId
            );
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }
}

sol! {
    /// Parameter layout of the income proof's public values, as consumed by
    /// `verifySalaryProof`.
    struct SalaryPublicValues {
        string salaryRange;
        bool signatureValid;
        bytes32 documentCommitment;
        bytes32 publicKeyHash;
    }
}
